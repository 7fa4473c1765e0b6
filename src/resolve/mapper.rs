use crate::config::{QcVocabulary, ResolutionPolicy};
use crate::registry::{InputSpec, Registry};
use crate::selection::{SelectionDirective, SessionSelection};
use crate::session::{ArtefactKind, Session};
use std::collections::BTreeMap;

/// Candidate identities per input name, in source declaration order.
pub type CandidateMap = BTreeMap<String, Vec<String>>;

/// Session governing an input, or `None` when the offset is out of range.
pub(crate) fn governing_session<'a>(
    sessions: &'a [Session],
    selection: SessionSelection,
) -> Option<&'a Session> {
    match selection {
        SessionSelection::Current => sessions.first(),
        SessionSelection::Prior { delta } | SessionSelection::PriorWith { delta } => {
            sessions.get(delta)
        }
        SessionSelection::First | SessionSelection::FirstWith => sessions.last(),
    }
}

/// Map every input of the registry to its candidate artefacts.
///
/// Every input gets an entry, empty when nothing matches.
pub fn map_artefacts_to_inputs(
    sessions: &[Session],
    registry: &Registry,
    policy: &ResolutionPolicy,
    qc: &QcVocabulary,
) -> CandidateMap {
    registry
        .inputs()
        .iter()
        .map(|input| {
            let candidates = match governing_session(sessions, input.select_session) {
                Some(session) => candidates_in_session(session, input, policy, qc),
                None => {
                    tracing::debug!(
                        input = %input.name,
                        select_session = %input.select_session,
                        "no session at requested offset"
                    );
                    Vec::new()
                }
            };
            (input.name.clone(), candidates)
        })
        .collect()
}

fn candidates_in_session(
    session: &Session,
    input: &InputSpec,
    policy: &ResolutionPolicy,
    qc: &QcVocabulary,
) -> Vec<String> {
    let artefacts = match input.kind {
        ArtefactKind::Scan => &session.scans,
        ArtefactKind::Assessor => &session.assessors,
    };
    let drop_unusable = policy.exclude_unusable_on_all
        && input.kind == ArtefactKind::Scan
        && input.select == SelectionDirective::All;

    let mut candidates = Vec::new();
    for artefact in artefacts {
        if !input.matches_type(&artefact.artefact_type) {
            continue;
        }
        if drop_unusable && qc.is_unusable_scan(artefact.quality.as_deref()) {
            tracing::debug!(
                input = %input.name,
                scan = %artefact.path,
                "excluding unusable scan"
            );
            continue;
        }
        candidates.push(artefact.path.clone());
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ProcessorDocument;
    use crate::session::ArtefactRecord;
    use serde_json::json;

    fn scan(path: &str, artefact_type: &str, quality: &str) -> ArtefactRecord {
        ArtefactRecord {
            path: path.to_string(),
            artefact_type: artefact_type.to_string(),
            quality: Some(quality.to_string()),
            proc_status: None,
            qc_status: None,
            resources: BTreeMap::new(),
            inputs: None,
        }
    }

    fn assessor(path: &str, artefact_type: &str) -> ArtefactRecord {
        ArtefactRecord {
            quality: None,
            ..scan(path, artefact_type, "")
        }
    }

    fn sessions() -> Vec<Session> {
        vec![
            Session {
                label: "e3".to_string(),
                created_epoch_ms: 30,
                scans: vec![
                    scan("/e3/scans/1", "T1", "usable"),
                    scan("/e3/scans/2", "fMRI_rest", "unusable"),
                    scan("/e3/scans/3", "fMRI_task", "usable"),
                    scan("/e3/scans/4", "MPRAGE", "usable"),
                ],
                assessors: vec![assessor("/e3/assessors/fs", "FS7_v1")],
            },
            Session {
                label: "e2".to_string(),
                created_epoch_ms: 20,
                scans: vec![scan("/e2/scans/1", "T1", "usable")],
                assessors: vec![assessor("/e2/assessors/fs", "FS7_v1")],
            },
            Session {
                label: "e1".to_string(),
                created_epoch_ms: 10,
                scans: vec![scan("/e1/scans/1", "T1", "usable")],
                assessors: Vec::new(),
            },
        ]
    }

    fn registry(value: serde_json::Value) -> Registry {
        let document = ProcessorDocument::from_value(value).expect("document");
        Registry::from_document(&document).expect("registry")
    }

    fn map(registry: &Registry, policy: ResolutionPolicy) -> CandidateMap {
        map_artefacts_to_inputs(&sessions(), registry, &policy, &QcVocabulary::default())
    }

    #[test]
    fn session_selection_picks_the_governing_session() {
        let registry = registry(json!({"inputs": {"xnat": {"scans": [
            {"name": "now", "types": "T1"},
            {"name": "prev", "types": "T1", "select-session": "prior(1)"},
            {"name": "far", "types": "T1", "select-session": "prior-with(5)"},
            {"name": "base", "types": "T1", "select-session": "first-with"}
        ]}}}));
        let candidates = map(&registry, ResolutionPolicy::default());
        assert_eq!(candidates["now"], vec!["/e3/scans/1"]);
        assert_eq!(candidates["prev"], vec!["/e2/scans/1"]);
        assert!(candidates["far"].is_empty());
        assert_eq!(candidates["base"], vec!["/e1/scans/1"]);
    }

    #[test]
    fn scans_match_once_in_declared_order() {
        let registry = registry(json!({"inputs": {"xnat": {"scans": [
            {"name": "anat", "types": "MPRAGE,T1,T*"}
        ]}}}));
        let candidates = map(&registry, ResolutionPolicy::default());
        assert_eq!(candidates["anat"], vec!["/e3/scans/1", "/e3/scans/4"]);
    }

    #[test]
    fn unusable_scans_are_only_dropped_under_all() {
        let registry = registry(json!({"inputs": {"xnat": {"scans": [
            {"name": "every", "types": "fMRI*", "select": "all"},
            {"name": "each", "types": "fMRI*"}
        ]}}}));
        let candidates = map(&registry, ResolutionPolicy::default());
        assert_eq!(candidates["every"], vec!["/e3/scans/3"]);
        assert_eq!(candidates["each"], vec!["/e3/scans/2", "/e3/scans/3"]);

        let keep_all = ResolutionPolicy {
            exclude_unusable_on_all: false,
            ..ResolutionPolicy::default()
        };
        let candidates = map(&registry, keep_all);
        assert_eq!(candidates["every"], vec!["/e3/scans/2", "/e3/scans/3"]);
    }

    #[test]
    fn assessors_match_literal_types_only() {
        let registry = registry(json!({"inputs": {"xnat": {"assessors": [
            {"name": "fs", "proctypes": "FS7_v1"},
            {"name": "glob", "proctypes": "FS*"}
        ]}}}));
        let candidates = map(&registry, ResolutionPolicy::default());
        assert_eq!(candidates["fs"], vec!["/e3/assessors/fs"]);
        assert!(candidates["glob"].is_empty());
    }

    #[test]
    fn no_sessions_means_no_candidates() {
        let registry = registry(json!({"inputs": {"xnat": {"scans": [
            {"name": "t1", "types": "T1"}
        ]}}}));
        let candidates = map_artefacts_to_inputs(
            &[],
            &registry,
            &ResolutionPolicy::default(),
            &QcVocabulary::default(),
        );
        assert_eq!(candidates.len(), 1);
        assert!(candidates["t1"].is_empty());
    }
}
