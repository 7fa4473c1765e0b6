//! In-memory session snapshots handed over by the metadata collaborator.
//!
//! Everything here is fetched before resolution starts; the core only reads it.
use crate::error::ResolveError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Artefact family.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArtefactKind {
    Scan,
    Assessor,
}

impl fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtefactKind::Scan => write!(f, "scan"),
            ArtefactKind::Assessor => write!(f, "assessor"),
        }
    }
}

/// Value chosen for one input within a parameter row.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum RowValue {
    Single(String),
    Multiple(Vec<String>),
    /// Optional input with no candidate.
    Absent,
}

impl RowValue {
    /// Identities referenced by this value, in order.
    pub fn identities(&self) -> Vec<&str> {
        match self {
            RowValue::Single(identity) => vec![identity.as_str()],
            RowValue::Multiple(identities) => identities.iter().map(String::as_str).collect(),
            RowValue::Absent => Vec::new(),
        }
    }

    pub fn as_single(&self) -> Option<&str> {
        match self {
            RowValue::Single(identity) => Some(identity),
            _ => None,
        }
    }
}

impl fmt::Display for RowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValue::Single(identity) => write!(f, "{identity}"),
            RowValue::Multiple(identities) => write!(f, "[{}]", identities.join(", ")),
            RowValue::Absent => write!(f, "-"),
        }
    }
}

/// One assignment of artefacts to inputs; equality is structural.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ParameterRow(BTreeMap<String, RowValue>);

impl ParameterRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: impl Into<String>, value: RowValue) {
        self.0.insert(input.into(), value);
    }

    pub fn get(&self, input: &str) -> Option<&RowValue> {
        self.0.get(input)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RowValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, RowValue)> for ParameterRow {
    fn from_iter<I: IntoIterator<Item = (K, RowValue)>>(iter: I) -> Self {
        ParameterRow(
            iter.into_iter()
                .map(|(input, value)| (input.into(), value))
                .collect(),
        )
    }
}

/// A scan or assessor as fetched from the imaging store.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ArtefactRecord {
    /// Full hierarchical path; unique across the subject.
    pub path: String,
    /// Scan type or assessor processor type.
    #[serde(rename = "type")]
    pub artefact_type: String,
    /// Scan quality label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Assessor processing status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_status: Option<String>,
    /// Assessor QC status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_status: Option<String>,
    /// Resource name to file names.
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<String>>,
    /// Inputs the backing entity recorded when it was created; `None` when
    /// they could not be retrieved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<ParameterRow>,
}

impl ArtefactRecord {
    /// Last path segment.
    pub fn label(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// One imaging session of the subject.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Session {
    pub label: String,
    pub created_epoch_ms: u64,
    #[serde(default)]
    pub scans: Vec<ArtefactRecord>,
    #[serde(default)]
    pub assessors: Vec<ArtefactRecord>,
}

impl Session {
    /// Scans then assessors, tagged with their kind.
    pub fn artefacts(&self) -> impl Iterator<Item = (ArtefactKind, &ArtefactRecord)> {
        self.scans
            .iter()
            .map(|scan| (ArtefactKind::Scan, scan))
            .chain(
                self.assessors
                    .iter()
                    .map(|assessor| (ArtefactKind::Assessor, assessor)),
            )
    }
}

/// Snapshot file: every session of one subject, most recent first.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SessionSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub sessions: Vec<Session>,
}

/// Load a session snapshot from JSON.
pub fn load_sessions(path: &Path) -> Result<SessionSnapshot> {
    let bytes =
        fs::read(path).with_context(|| format!("read session snapshot {}", path.display()))?;
    let snapshot: SessionSnapshot =
        serde_json::from_slice(&bytes).context("parse session snapshot JSON")?;
    Ok(snapshot)
}

/// Reject session lists that are not strictly descending by creation time.
pub fn ensure_descending(sessions: &[Session]) -> Result<(), ResolveError> {
    match sessions
        .windows(2)
        .position(|pair| pair[0].created_epoch_ms <= pair[1].created_epoch_ms)
    {
        Some(index) => Err(ResolveError::OrderingViolation { index: index + 1 }),
        None => Ok(()),
    }
}
