//! Resolution pipeline for one session of one subject.
//!
//! A [`Resolver`] is built once per processor document and is immutable
//! afterwards. Every call to [`Resolver::resolve`] rebuilds the catalog,
//! candidates and matrix from the sessions it is given, so repeated calls on
//! the same snapshot produce identical results.
pub mod filter;
pub mod mapper;
pub mod matrix;
pub mod reconcile;

pub use filter::{filter_matrix, reference_value};
pub use mapper::{map_artefacts_to_inputs, CandidateMap};
pub use matrix::generate_parameter_matrix;
pub use reconcile::{compare_to_existing, ExistingWorkEntry};

use crate::catalog::Catalog;
use crate::config::ResolverConfig;
use crate::document::ProcessorDocument;
use crate::error::ResolveError;
use crate::registry::Registry;
use crate::session::{ensure_descending, ParameterRow, Session};
use crate::util::{proctype_from_spider_path, sha256_hex};
use serde::Serialize;

/// Outcome of resolving one session.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub session: String,
    pub proctype: String,
    /// Rows that survived the match filters, in generation order.
    pub rows: Vec<ParameterRow>,
    /// Row-aligned pairing with existing assessors; empty when not reconciled.
    pub existing: Vec<ExistingWorkEntry>,
    /// False when reconciliation failed closed.
    pub reconciled: bool,
    /// SHA-256 over the canonical JSON of `rows` and `existing`.
    pub digest: String,
}

impl Resolution {
    /// Rows with no existing assessor; none when reconciliation failed.
    pub fn pending(&self) -> impl Iterator<Item = &ParameterRow> {
        self.existing
            .iter()
            .filter(|entry| entry.is_pending())
            .map(|entry| &entry.row)
    }
}

#[derive(Serialize)]
struct DigestInput<'a> {
    rows: &'a [ParameterRow],
    existing: &'a [ExistingWorkEntry],
}

fn digest(rows: &[ParameterRow], existing: &[ExistingWorkEntry]) -> String {
    // Maps are BTreeMaps throughout, so the JSON is canonical.
    let bytes =
        serde_json::to_vec(&DigestInput { rows, existing }).expect("serialize digest input");
    sha256_hex(&bytes)
}

/// Resolver for one processor document.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Registry,
    config: ResolverConfig,
    proctype: String,
    xsitype: String,
    longitudinal: bool,
}

impl Resolver {
    /// Build the registry and settle the processor type.
    ///
    /// An explicit `proctype` wins; otherwise it is derived from
    /// `inputs.default.spider_path`.
    pub fn new(
        document: &ProcessorDocument,
        proctype: Option<&str>,
        config: ResolverConfig,
    ) -> Result<Self, ResolveError> {
        let registry = Registry::from_document(document)?;
        let proctype = proctype
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| {
                document
                    .inputs
                    .default
                    .spider_path
                    .as_deref()
                    .and_then(proctype_from_spider_path)
            })
            .ok_or(ResolveError::MissingProctype)?;
        let longitudinal = document.is_longitudinal();
        tracing::debug!(proctype = %proctype, longitudinal, "resolver ready");
        Ok(Resolver {
            registry,
            config,
            proctype,
            xsitype: document.xsitype().to_string(),
            longitudinal,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn proctype(&self) -> &str {
        &self.proctype
    }

    /// XSI type recorded on assessors this processor creates.
    pub fn xsitype(&self) -> &str {
        &self.xsitype
    }

    pub fn is_longitudinal(&self) -> bool {
        self.longitudinal
    }

    /// Sessions the resolution of `current_label` may look at, current first.
    pub fn relevant_sessions<'a>(
        &self,
        current_label: &str,
        sessions: &'a [Session],
    ) -> Result<&'a [Session], ResolveError> {
        ensure_descending(sessions)?;
        let index = sessions
            .iter()
            .position(|session| session.label == current_label)
            .ok_or_else(|| ResolveError::UnknownSession {
                label: current_label.to_string(),
            })?;
        if self.longitudinal {
            Ok(&sessions[index..])
        } else {
            Ok(&sessions[index..=index])
        }
    }

    /// Resolve every parameter row for `current_label`.
    ///
    /// `sessions` is every session of the subject, most recent first, and
    /// must contain the current one.
    pub fn resolve(
        &self,
        current_label: &str,
        sessions: &[Session],
    ) -> Result<Resolution, ResolveError> {
        let relevant = self.relevant_sessions(current_label, sessions)?;
        let current = &relevant[0];

        let catalog = Catalog::build(relevant);
        let candidates = map_artefacts_to_inputs(
            relevant,
            &self.registry,
            &self.config.policy,
            &self.config.qc,
        );
        let rows = generate_parameter_matrix(
            &self.registry,
            &candidates,
            &catalog,
            &self.config.policy,
        )?;
        let rows = filter_matrix(rows, self.registry.match_filters(), &catalog);
        let (existing, reconciled) = match compare_to_existing(current, &self.proctype, &rows) {
            Some(existing) => (existing, true),
            None => (Vec::new(), false),
        };

        let resolution = Resolution {
            session: current.label.clone(),
            proctype: self.proctype.clone(),
            digest: digest(&rows, &existing),
            rows,
            existing,
            reconciled,
        };
        tracing::info!(
            session = %resolution.session,
            proctype = %resolution.proctype,
            rows = resolution.rows.len(),
            pending = resolution.pending().count(),
            reconciled,
            "session resolved"
        );
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ArtefactRecord, RowValue};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn document(value: serde_json::Value) -> ProcessorDocument {
        ProcessorDocument::from_value(value).expect("document")
    }

    fn simple_document() -> ProcessorDocument {
        document(json!({
            "inputs": {
                "default": {"spider_path": "/opt/spiders/Spider_Demo_v2_1_0.py"},
                "xnat": {"scans": [
                    {"name": "t1", "types": "T1", "resources": [{"resource": "NIFTI"}]}
                ]}
            }
        }))
    }

    fn scan(path: &str) -> ArtefactRecord {
        ArtefactRecord {
            path: path.to_string(),
            artefact_type: "T1".to_string(),
            quality: Some("usable".to_string()),
            proc_status: None,
            qc_status: None,
            resources: BTreeMap::new(),
            inputs: None,
        }
    }

    fn session(label: &str, created_epoch_ms: u64, scans: Vec<ArtefactRecord>) -> Session {
        Session {
            label: label.to_string(),
            created_epoch_ms,
            scans,
            assessors: Vec::new(),
        }
    }

    #[test]
    fn proctype_is_derived_from_spider_path() {
        let resolver =
            Resolver::new(&simple_document(), None, ResolverConfig::default()).expect("resolver");
        assert_eq!(resolver.proctype(), "Demo_v2");
        assert_eq!(resolver.xsitype(), "proc:genProcData");
        assert!(!resolver.is_longitudinal());

        let resolver = Resolver::new(&simple_document(), Some("Given_v1"), ResolverConfig::default())
            .expect("resolver");
        assert_eq!(resolver.proctype(), "Given_v1");
    }

    #[test]
    fn missing_proctype_is_an_error() {
        let document = document(json!({"inputs": {"xnat": {}}}));
        let err = Resolver::new(&document, None, ResolverConfig::default()).expect_err("proctype");
        assert_eq!(err, ResolveError::MissingProctype);
    }

    #[test]
    fn non_longitudinal_documents_only_see_the_current_session() {
        let resolver =
            Resolver::new(&simple_document(), None, ResolverConfig::default()).expect("resolver");
        let sessions = vec![
            session("e2", 20, vec![scan("/e2/scans/1")]),
            session("e1", 10, vec![scan("/e1/scans/1")]),
        ];
        let relevant = resolver.relevant_sessions("e2", &sessions).expect("relevant");
        assert_eq!(relevant.len(), 1);

        let resolution = resolver.resolve("e2", &sessions).expect("resolve");
        assert_eq!(
            resolution.rows,
            vec![[("t1", RowValue::Single("/e2/scans/1".to_string()))]
                .into_iter()
                .collect::<ParameterRow>()]
        );
        assert!(resolution.reconciled);
        assert_eq!(resolution.pending().count(), 1);
    }

    #[test]
    fn unknown_session_and_bad_ordering_are_rejected() {
        let resolver =
            Resolver::new(&simple_document(), None, ResolverConfig::default()).expect("resolver");
        let sessions = vec![session("e2", 20, Vec::new()), session("e1", 10, Vec::new())];
        assert_eq!(
            resolver.resolve("e9", &sessions).expect_err("unknown"),
            ResolveError::UnknownSession {
                label: "e9".to_string()
            }
        );
        let reversed = vec![session("e1", 10, Vec::new()), session("e2", 20, Vec::new())];
        assert_eq!(
            resolver.resolve("e2", &reversed).expect_err("ordering"),
            ResolveError::OrderingViolation { index: 1 }
        );
    }

    #[test]
    fn digest_is_stable_across_calls() {
        let resolver =
            Resolver::new(&simple_document(), None, ResolverConfig::default()).expect("resolver");
        let sessions = vec![session("e1", 10, vec![scan("/e1/scans/1"), scan("/e1/scans/2")])];
        let first = resolver.resolve("e1", &sessions).expect("first");
        let second = resolver.resolve("e1", &sessions).expect("second");
        assert_eq!(first, second);
        assert_eq!(first.digest.len(), 64);
        assert_eq!(first.rows.len(), 2);
    }

    #[test]
    fn digest_covers_the_serialized_rows() {
        let rows = vec![[("t1", RowValue::Single("/e1/scans/1".to_string()))]
            .into_iter()
            .collect::<ParameterRow>()];
        let expected = sha256_hex(br#"{"rows":[{"t1":"/e1/scans/1"}],"existing":[]}"#);
        assert_eq!(digest(&rows, &[]), expected);
        assert_ne!(digest(&rows, &[]), sha256_hex(b""));
        assert_ne!(digest(&[], &[]), digest(&rows, &[]));
    }
}
