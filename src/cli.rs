//! CLI argument parsing for the resolver.
//!
//! The CLI only loads files and prints results; every decision is made by the
//! library so the same core can run inside a scheduler.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "proc-inputs",
    version,
    about = "Resolve processor inputs against a subject's imaging sessions",
    after_help = "Commands:\n  validate --processor <file>                              Check a processor document\n  resolve --processor <file> --sessions <file> --session <label>\n                                                           List parameter rows and existing assessors\n  inputs ... --row <n> | --assessor <path>                 Resolve downloads for one row\n  config [--out <file>]                                    Write a default resolver config\n\nExamples:\n  proc-inputs validate --processor fs7.yaml\n  proc-inputs resolve --processor fs7.yaml --sessions subj.json --session E3 --json\n  proc-inputs inputs --processor fs7.yaml --sessions subj.json --session E3 --row 0",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Validate(ValidateArgs),
    Resolve(ResolveArgs),
    Inputs(InputsArgs),
    Config(ConfigArgs),
}

/// Validate command inputs.
#[derive(Parser, Debug)]
#[command(about = "Check a processor document against the input schema")]
pub struct ValidateArgs {
    /// Processor document (.yaml, .yml or .json)
    #[arg(long, value_name = "FILE")]
    pub processor: PathBuf,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit debug logs on stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Resolve command inputs.
#[derive(Parser, Debug)]
#[command(about = "Resolve parameter rows for one session")]
pub struct ResolveArgs {
    /// Processor document (.yaml, .yml or .json)
    #[arg(long, value_name = "FILE")]
    pub processor: PathBuf,

    /// Session snapshot JSON for the subject, most recent session first
    #[arg(long, value_name = "FILE")]
    pub sessions: PathBuf,

    /// Label of the session to resolve
    #[arg(long, value_name = "LABEL")]
    pub session: String,

    /// Processor type; derived from inputs.default.spider_path when omitted
    #[arg(long, value_name = "TYPE")]
    pub proctype: Option<String>,

    /// Resolver config JSON; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit debug logs on stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Inputs command: resolve the download plan for one row.
#[derive(Parser, Debug)]
#[command(about = "Resolve command variables and downloads for one row")]
pub struct InputsArgs {
    /// Processor document (.yaml, .yml or .json)
    #[arg(long, value_name = "FILE")]
    pub processor: PathBuf,

    /// Session snapshot JSON for the subject, most recent session first
    #[arg(long, value_name = "FILE")]
    pub sessions: PathBuf,

    /// Label of the session the row belongs to
    #[arg(long, value_name = "LABEL")]
    pub session: String,

    /// Processor type; derived from inputs.default.spider_path when omitted
    #[arg(long, value_name = "TYPE")]
    pub proctype: Option<String>,

    /// Resolver config JSON; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Position of the row in the resolved matrix
    #[arg(
        long,
        value_name = "N",
        conflicts_with = "assessor",
        required_unless_present = "assessor"
    )]
    pub row: Option<usize>,

    /// Existing assessor whose recorded inputs form the row
    #[arg(long, value_name = "PATH")]
    pub assessor: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit debug logs on stderr
    #[arg(long)]
    pub verbose: bool,
}

/// Config command inputs.
#[derive(Parser, Debug)]
#[command(about = "Write a default resolver config")]
pub struct ConfigArgs {
    /// Destination path for the config JSON; printed to stdout when omitted
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long, requires = "out")]
    pub force: bool,
}
