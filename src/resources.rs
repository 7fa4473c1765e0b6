//! Resource resolution for one accepted parameter row.
//!
//! Turns a row into the command variables and download descriptors a job
//! needs, after checking that every required artefact is ready to be used.
use crate::catalog::Catalog;
use crate::config::QcVocabulary;
use crate::document::ResourceKind;
use crate::error::{NeedsInputReason, ResolveError};
use crate::registry::{InputSpec, Registry, ResourceSpec};
use crate::session::{ArtefactKind, ArtefactRecord, ParameterRow, RowValue};
use crate::util::glob_matcher;
use serde::Serialize;
use std::collections::BTreeMap;

/// One file or directory to stage before the job runs.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DownloadDescriptor {
    pub fdest: String,
    pub ftype: ResourceKind,
    /// Comma-separated download locators.
    pub fpath: String,
}

/// Command variables and downloads for one row.
#[derive(Debug, Serialize, Clone, PartialEq, Eq, Default)]
pub struct ResourcePlan {
    pub variables: BTreeMap<String, String>,
    pub downloads: Vec<DownloadDescriptor>,
}

fn resource_segment(kind: ArtefactKind) -> &'static str {
    match kind {
        ArtefactKind::Scan => "resources",
        ArtefactKind::Assessor => "out/resources",
    }
}

fn readiness(
    input: &InputSpec,
    record: &ArtefactRecord,
    qc: &QcVocabulary,
) -> Result<(), NeedsInputReason> {
    match input.kind {
        ArtefactKind::Scan => {
            if input.needs_qc && qc.is_unusable_scan(record.quality.as_deref()) {
                return Err(NeedsInputReason::NotUsable);
            }
        }
        ArtefactKind::Assessor => {
            let qc_status = record.qc_status.as_deref();
            if qc.is_proc_not_ready(record.proc_status.as_deref()) || qc.is_qc_not_ready(qc_status) {
                return Err(NeedsInputReason::NotReady);
            }
            if input.needs_qc {
                if qc.is_awaiting_qc(qc_status) {
                    return Err(NeedsInputReason::NeedsQc);
                }
                if qc.is_bad_qc(qc_status) {
                    return Err(NeedsInputReason::BadQc);
                }
            }
        }
    }
    Ok(())
}

/// Fail with `NeedsInput` when an artefact of a required input is not usable yet.
///
/// Optional inputs are never gated.
pub fn check_readiness(
    registry: &Registry,
    row: &ParameterRow,
    catalog: &Catalog<'_>,
    qc: &QcVocabulary,
) -> Result<(), ResolveError> {
    for input in registry.inputs().iter().filter(|input| input.required) {
        let Some(value) = row.get(&input.name) else {
            continue;
        };
        for identity in value.identities() {
            let entry = catalog.get(identity).ok_or_else(|| {
                ResolveError::needs_input(&input.name, NeedsInputReason::UnknownArtefact)
            })?;
            readiness(input, entry.record, qc)
                .map_err(|reason| ResolveError::needs_input(&input.name, reason))?;
        }
    }
    Ok(())
}

fn resource_paths(
    input: &InputSpec,
    resource: &ResourceSpec,
    files: &[String],
) -> Result<Vec<String>, ResolveError> {
    let name = &resource.resource;
    if let Some(filepath) = resource.filepath.as_deref() {
        return Ok(vec![format!("{name}/files/{filepath}")]);
    }
    let fmatch = match (resource.fmatch.as_deref(), resource.ftype) {
        (Some(pattern), _) => Some(pattern),
        (None, ResourceKind::File) => Some("*"),
        (None, _) => None,
    };
    let Some(pattern) = fmatch else {
        return Ok(vec![format!("{name}/files")]);
    };
    let matcher = glob_matcher(pattern)?;
    let paths: Vec<String> = files
        .iter()
        .filter(|file| matcher.is_match(file))
        .map(|file| format!("{name}/files/{file}"))
        .collect();
    if paths.is_empty() {
        return Err(ResolveError::needs_input(
            &input.name,
            NeedsInputReason::MissingResource(name.clone()),
        ));
    }
    Ok(paths)
}

/// Resolve command variables and downloads for `row`.
///
/// Multi-valued inputs produce one download per artefact with the artefact's
/// position prefixed to `fdest`; their variable joins the destinations with
/// commas. A variable whose input is absent from the row is left unset.
pub fn resolve_resources(
    registry: &Registry,
    row: &ParameterRow,
    catalog: &Catalog<'_>,
    host: &str,
    qc: &QcVocabulary,
) -> Result<ResourcePlan, ResolveError> {
    check_readiness(registry, row, catalog, qc)?;

    let mut plan = ResourcePlan::default();
    for (varname, binding) in registry.variables() {
        let Some(input) = registry.input(&binding.input) else {
            continue;
        };
        let Some(resource) = input.resource_for_variable(varname) else {
            continue;
        };
        let value = match row.get(&input.name) {
            Some(RowValue::Absent) | None => {
                tracing::debug!(variable = %varname, input = %input.name, "input absent; variable unset");
                continue;
            }
            Some(value) => value,
        };
        let multiple = matches!(value, RowValue::Multiple(_));

        let mut destinations = Vec::new();
        for (position, identity) in value.identities().into_iter().enumerate() {
            let entry = catalog.get(identity).ok_or_else(|| {
                ResolveError::needs_input(&input.name, NeedsInputReason::UnknownArtefact)
            })?;
            let files = entry.record.resources.get(&resource.resource).ok_or_else(|| {
                ResolveError::needs_input(
                    &input.name,
                    NeedsInputReason::MissingResource(resource.resource.clone()),
                )
            })?;
            let segment = resource_segment(input.kind);
            let fpath = resource_paths(input, resource, files)?
                .iter()
                .map(|path| format!("{host}/data{identity}/{segment}/{path}"))
                .collect::<Vec<_>>()
                .join(",");
            let fdest = if multiple {
                format!("{position}{}", resource.fdest)
            } else {
                resource.fdest.clone()
            };
            destinations.push(if fdest.is_empty() {
                fpath.clone()
            } else {
                fdest.clone()
            });
            plan.downloads.push(DownloadDescriptor {
                fdest,
                ftype: resource.ftype,
                fpath,
            });
        }
        plan.variables.insert(varname.clone(), destinations.join(","));
    }
    tracing::debug!(
        variables = plan.variables.len(),
        downloads = plan.downloads.len(),
        "resources resolved"
    );
    Ok(plan)
}

/// Store-relative resource path per command variable.
pub fn command_paths(registry: &Registry, row: &ParameterRow) -> BTreeMap<String, String> {
    let mut paths = BTreeMap::new();
    for (varname, binding) in registry.variables() {
        let (Some(input), Some(value)) = (registry.input(&binding.input), row.get(&binding.input))
        else {
            continue;
        };
        let segment = resource_segment(input.kind);
        let joined = value
            .identities()
            .iter()
            .map(|identity| format!("{identity}/{segment}/{}", binding.resource))
            .collect::<Vec<_>>()
            .join(",");
        if !joined.is_empty() {
            paths.insert(varname.clone(), joined);
        }
    }
    paths
}
