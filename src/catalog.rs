//! Identity-keyed view over every artefact of the relevant sessions.
use crate::session::{ArtefactKind, ArtefactRecord, ParameterRow, RowValue, Session};
use std::collections::BTreeMap;

/// Query capability for the inputs an artefact's backing entity recorded.
///
/// `from` derivation, `parent/child` filter references and reconciliation
/// reach recorded inputs only through this trait.
pub trait InputLookup {
    /// Recorded inputs of the entity behind `identity`, if retrievable.
    fn recorded_inputs(&self, identity: &str) -> Option<&ParameterRow>;

    /// One recorded input field of the entity behind `identity`.
    fn recorded_input(&self, identity: &str, field: &str) -> Option<&RowValue> {
        self.recorded_inputs(identity)?.get(field)
    }
}

/// A catalogued artefact: the borrowed record plus its kind.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry<'a> {
    pub kind: ArtefactKind,
    pub record: &'a ArtefactRecord,
}

/// Flat identity → artefact map, rebuilt for every resolution.
#[derive(Debug, Default)]
pub struct Catalog<'a> {
    entries: BTreeMap<&'a str, CatalogEntry<'a>>,
}

impl<'a> Catalog<'a> {
    /// Catalogue scans then assessors of each session in order; a repeated
    /// identity keeps the last record seen.
    pub fn build(sessions: &'a [Session]) -> Self {
        let mut entries = BTreeMap::new();
        for session in sessions {
            for (kind, record) in session.artefacts() {
                entries.insert(record.path.as_str(), CatalogEntry { kind, record });
            }
        }
        tracing::debug!(artefacts = entries.len(), "artefact catalog built");
        Catalog { entries }
    }

    pub fn get(&self, identity: &str) -> Option<CatalogEntry<'a>> {
        self.entries.get(identity).copied()
    }
}

impl InputLookup for Catalog<'_> {
    fn recorded_inputs(&self, identity: &str) -> Option<&ParameterRow> {
        self.entries.get(identity)?.record.inputs.as_ref()
    }
}
