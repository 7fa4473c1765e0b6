//! Typed model of a processor document.
//!
//! Documents are read as YAML or JSON into a `serde_json::Value` first, so the
//! same value can feed both [`crate::validate::validate_document`] and the
//! typed conversion below.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default XSI type recorded on created assessors.
pub const DEFAULT_XSITYPE: &str = "proc:genProcData";

fn default_true() -> bool {
    true
}

/// Resource payload kind for downloads.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    #[default]
    #[serde(rename = "FILE")]
    File,
    #[serde(rename = "DIR")]
    Dir,
    #[serde(rename = "DIRJ")]
    DirJ,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::File => "FILE",
            ResourceKind::Dir => "DIR",
            ResourceKind::DirJ => "DIRJ",
        }
    }
}

/// One resource declared on an input entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub varname: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmatch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(default)]
    pub fdest: String,
    #[serde(default)]
    pub ftype: ResourceKind,
}

/// A `scans` entry.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub name: String,
    pub types: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(
        default,
        rename = "select-session",
        skip_serializing_if = "Option::is_none"
    )]
    pub select_session: Option<String>,
    #[serde(default)]
    pub needs_qc: bool,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// An `assessors` entry; `proctypes` lists literal assessor types.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AssessorEntry {
    pub name: String,
    pub proctypes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(
        default,
        rename = "select-session",
        skip_serializing_if = "Option::is_none"
    )]
    pub select_session: Option<String>,
    #[serde(default)]
    pub needs_qc: bool,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// A `filters` entry; only `type: match` is understood.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FilterEntry {
    #[serde(rename = "type")]
    pub filter_type: String,
    #[serde(default)]
    pub inputs: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct XnatInputs {
    #[serde(default)]
    pub scans: Vec<ScanEntry>,
    #[serde(default)]
    pub assessors: Vec<AssessorEntry>,
    #[serde(default)]
    pub filters: Vec<FilterEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct DefaultInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spider_path: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct InputsSection {
    #[serde(default)]
    pub default: DefaultInputs,
    pub xnat: XnatInputs,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct Attrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsitype: Option<String>,
}

/// Processor document (`*.yaml` processor file).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ProcessorDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaml_processor_version: Option<String>,
    pub inputs: InputsSection,
    #[serde(default)]
    pub attrs: Attrs,
}

impl ProcessorDocument {
    /// Convert an already-loaded document value into the typed model.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("parse processor document")
    }

    pub fn xsitype(&self) -> &str {
        self.attrs.xsitype.as_deref().unwrap_or(DEFAULT_XSITYPE)
    }

    /// True when any input reaches beyond the current session.
    pub fn is_longitudinal(&self) -> bool {
        let xnat = &self.inputs.xnat;
        xnat.scans
            .iter()
            .map(|scan| scan.select_session.as_deref())
            .chain(
                xnat.assessors
                    .iter()
                    .map(|assessor| assessor.select_session.as_deref()),
            )
            .any(|select_session| select_session.is_some_and(|text| text.trim() != "current"))
    }
}

/// Read a processor document as YAML (`.yaml`/`.yml`) or JSON.
pub fn load_document_value(path: &Path) -> Result<serde_json::Value> {
    let bytes =
        fs::read(path).with_context(|| format!("read processor document {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_slice(&bytes).context("parse processor document YAML")
        }
        Some("json") => serde_json::from_slice(&bytes).context("parse processor document JSON"),
        _ => Err(anyhow!(
            "processor document {} must end in .yaml, .yml or .json",
            path.display()
        )),
    }
}

/// Load and convert a processor document in one step.
pub fn load_document(path: &Path) -> Result<ProcessorDocument> {
    let value = load_document_value(path)?;
    ProcessorDocument::from_value(value)
        .with_context(|| format!("load processor document {}", path.display()))
}
