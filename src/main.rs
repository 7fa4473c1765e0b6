mod cli;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::{Command, ConfigArgs, InputsArgs, ResolveArgs, RootArgs, ValidateArgs};
use proc_inputs::catalog::Catalog;
use proc_inputs::config::{config_stub, default_config, load_config, write_config};
use proc_inputs::document::{load_document_value, ProcessorDocument};
use proc_inputs::registry::Registry;
use proc_inputs::resources::{command_paths, resolve_resources, ResourcePlan};
use proc_inputs::session::{load_sessions, ParameterRow, Session};
use proc_inputs::validate::validate_document;
use proc_inputs::{Resolution, Resolver};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(wants_verbose(&args.command));

    match args.command {
        Command::Validate(args) => cmd_validate(args),
        Command::Resolve(args) => cmd_resolve(args),
        Command::Inputs(args) => cmd_inputs(args),
        Command::Config(args) => cmd_config(args),
    }
}

fn wants_verbose(command: &Command) -> bool {
    match command {
        Command::Validate(args) => args.verbose,
        Command::Resolve(args) => args.verbose,
        Command::Inputs(args) => args.verbose,
        Command::Config(_) => false,
    }
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Serialize)]
struct ValidationOutput<'a> {
    processor: &'a Path,
    valid: bool,
    errors: &'a [String],
}

fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let errors = document_errors(&args.processor)?;
    if args.json {
        print_json(&ValidationOutput {
            processor: &args.processor,
            valid: errors.is_empty(),
            errors: &errors,
        })?;
    } else if errors.is_empty() {
        println!("{}: valid", args.processor.display());
    } else {
        for error in &errors {
            println!("{error}");
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(anyhow!(
            "{} has {} error(s)",
            args.processor.display(),
            errors.len()
        ))
    }
}

/// Schema errors, or registry errors when the schema is satisfied.
fn document_errors(path: &Path) -> Result<Vec<String>> {
    let value = load_document_value(path)?;
    let errors = validate_document(&value);
    if !errors.is_empty() {
        return Ok(errors);
    }
    let document = ProcessorDocument::from_value(value)?;
    Ok(match Registry::from_document(&document) {
        Ok(_) => Vec::new(),
        Err(err) => vec![err.to_string()],
    })
}

struct Loaded {
    resolver: Resolver,
    sessions: Vec<Session>,
}

fn load(
    processor: &Path,
    sessions: &Path,
    proctype: Option<&str>,
    config: Option<&Path>,
) -> Result<Loaded> {
    let value = load_document_value(processor)?;
    let errors = validate_document(&value);
    if !errors.is_empty() {
        return Err(anyhow!(
            "{} is invalid:\n  {}",
            processor.display(),
            errors.join("\n  ")
        ));
    }
    let document = ProcessorDocument::from_value(value)?;
    let config = match config {
        Some(path) => load_config(path)?,
        None => default_config(),
    };
    let resolver = Resolver::new(&document, proctype, config)
        .with_context(|| format!("prepare resolver for {}", processor.display()))?;
    let snapshot = load_sessions(sessions)?;
    Ok(Loaded {
        resolver,
        sessions: snapshot.sessions,
    })
}

fn cmd_resolve(args: ResolveArgs) -> Result<()> {
    let loaded = load(
        &args.processor,
        &args.sessions,
        args.proctype.as_deref(),
        args.config.as_deref(),
    )?;
    let resolution = loaded
        .resolver
        .resolve(&args.session, &loaded.sessions)
        .with_context(|| format!("resolve session {}", args.session))?;
    if args.json {
        print_json(&resolution)?;
    } else {
        print_resolution(&resolution);
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    let pending = resolution.pending().count();
    println!(
        "session {} ({}): {} row(s), {} pending",
        resolution.session,
        resolution.proctype,
        resolution.rows.len(),
        pending
    );
    if !resolution.reconciled {
        println!("existing assessors not reconciled: recorded inputs unavailable");
        for (index, row) in resolution.rows.iter().enumerate() {
            println!("  [{index}] {}", render_row(row));
        }
        return;
    }
    for (index, entry) in resolution.existing.iter().enumerate() {
        let state = if entry.is_pending() {
            "pending".to_string()
        } else {
            format!("existing {}", entry.existing.join(", "))
        };
        println!("  [{index}] {state}: {}", render_row(&entry.row));
    }
}

fn render_row(row: &ParameterRow) -> String {
    row.iter()
        .map(|(input, value)| format!("{input}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Serialize)]
struct InputsOutput<'a> {
    status: &'static str,
    row: &'a ParameterRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<ResourcePlan>,
    command_paths: BTreeMap<String, String>,
}

fn cmd_inputs(args: InputsArgs) -> Result<()> {
    let loaded = load(
        &args.processor,
        &args.sessions,
        args.proctype.as_deref(),
        args.config.as_deref(),
    )?;
    let resolver = &loaded.resolver;
    let relevant = resolver.relevant_sessions(&args.session, &loaded.sessions)?;
    let catalog = Catalog::build(relevant);

    let row = match (args.row, args.assessor.as_deref()) {
        (Some(index), _) => {
            let resolution = resolver.resolve(&args.session, &loaded.sessions)?;
            let count = resolution.rows.len();
            resolution
                .rows
                .into_iter()
                .nth(index)
                .ok_or_else(|| anyhow!("row {index} is out of range ({count} row(s))"))?
        }
        (None, Some(assessor)) => catalog
            .get(assessor)
            .ok_or_else(|| anyhow!("assessor {assessor} is not in session {} or earlier", args.session))?
            .record
            .inputs
            .clone()
            .ok_or_else(|| anyhow!("assessor {assessor} has no recorded inputs"))?,
        (None, None) => return Err(anyhow!("either --row or --assessor is required")),
    };

    let config = resolver.config();
    let paths = command_paths(resolver.registry(), &row);
    let output = match resolve_resources(resolver.registry(), &row, &catalog, &config.host, &config.qc)
    {
        Ok(plan) => InputsOutput {
            status: "ready",
            row: &row,
            reason: None,
            plan: Some(plan),
            command_paths: paths,
        },
        Err(err) if err.is_needs_input() => {
            tracing::info!(reason = %err, "row needs inputs");
            InputsOutput {
                status: "needs_inputs",
                row: &row,
                reason: Some(err.to_string()),
                plan: None,
                command_paths: paths,
            }
        }
        Err(err) => return Err(err).context("resolve resources"),
    };

    if args.json {
        return print_json(&output);
    }
    println!("status: {}", output.status);
    println!("row: {}", render_row(output.row));
    if let Some(reason) = &output.reason {
        println!("reason: {reason}");
    }
    if let Some(plan) = &output.plan {
        for (name, value) in &plan.variables {
            println!("  {name}={value}");
        }
        for download in &plan.downloads {
            println!(
                "  download {} ({}) <- {}",
                download.fdest,
                download.ftype.as_str(),
                download.fpath
            );
        }
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> Result<()> {
    let Some(out) = args.out else {
        println!("{}", config_stub()?);
        return Ok(());
    };
    if out.exists() && !args.force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            out.display()
        ));
    }
    write_config(&out, &default_config())?;
    println!("Wrote resolver config to {}", out.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{text}");
    Ok(())
}
