//! Reconciliation of generated rows against assessors that already exist.
use crate::session::{ParameterRow, Session};
use serde::Serialize;

/// A row plus the identities of existing assessors built from exactly it.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ExistingWorkEntry {
    pub row: ParameterRow,
    pub existing: Vec<String>,
}

impl ExistingWorkEntry {
    pub fn is_pending(&self) -> bool {
        self.existing.is_empty()
    }
}

/// Pair every row with the existing assessors of `proctype` in `session`.
///
/// Returns `None` when any such assessor has no retrievable recorded inputs:
/// without them a match cannot be ruled out, so nothing is reported as
/// pending.
pub fn compare_to_existing(
    session: &Session,
    proctype: &str,
    rows: &[ParameterRow],
) -> Option<Vec<ExistingWorkEntry>> {
    let mut existing = vec![Vec::new(); rows.len()];
    for assessor in session
        .assessors
        .iter()
        .filter(|assessor| assessor.artefact_type == proctype)
    {
        let Some(recorded) = assessor.inputs.as_ref() else {
            tracing::warn!(
                assessor = %assessor.label(),
                session = %session.label,
                "existing assessor has no recorded inputs; skipping reconciliation"
            );
            return None;
        };
        for (position, row) in rows.iter().enumerate() {
            if recorded == row {
                existing[position].push(assessor.path.clone());
            }
        }
    }
    Some(
        rows.iter()
            .cloned()
            .zip(existing)
            .map(|(row, existing)| ExistingWorkEntry { row, existing })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ArtefactRecord, RowValue};
    use std::collections::BTreeMap;

    fn row(t1: &str) -> ParameterRow {
        [("t1", RowValue::Single(t1.to_string()))].into_iter().collect()
    }

    fn assessor(path: &str, artefact_type: &str, inputs: Option<ParameterRow>) -> ArtefactRecord {
        ArtefactRecord {
            path: path.to_string(),
            artefact_type: artefact_type.to_string(),
            quality: None,
            proc_status: Some("COMPLETE".to_string()),
            qc_status: None,
            resources: BTreeMap::new(),
            inputs,
        }
    }

    fn session(assessors: Vec<ArtefactRecord>) -> Session {
        Session {
            label: "e1".to_string(),
            created_epoch_ms: 10,
            scans: Vec::new(),
            assessors,
        }
    }

    #[test]
    fn rows_pair_with_structurally_equal_assessors() {
        let session = session(vec![
            assessor("/e1/assessors/a", "Demo_v1", Some(row("/e1/scans/1"))),
            assessor("/e1/assessors/b", "Demo_v1", Some(row("/e1/scans/1"))),
            assessor("/e1/assessors/c", "Other_v1", Some(row("/e1/scans/2"))),
        ]);
        let rows = vec![row("/e1/scans/1"), row("/e1/scans/2")];
        let entries = compare_to_existing(&session, "Demo_v1", &rows).expect("reconciled");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].existing, vec!["/e1/assessors/a", "/e1/assessors/b"]);
        assert!(!entries[0].is_pending());
        assert!(entries[1].is_pending());
        assert_eq!(entries[1].row, rows[1]);
    }

    #[test]
    fn assessor_without_recorded_inputs_fails_closed() {
        let session = session(vec![
            assessor("/e1/assessors/a", "Demo_v1", Some(row("/e1/scans/1"))),
            assessor("/e1/assessors/b", "Demo_v1", None),
        ]);
        assert_eq!(compare_to_existing(&session, "Demo_v1", &[row("/e1/scans/2")]), None);
    }

    #[test]
    fn other_types_without_inputs_are_ignored() {
        let session = session(vec![assessor("/e1/assessors/x", "Other_v1", None)]);
        let entries = compare_to_existing(&session, "Demo_v1", &[row("/e1/scans/1")])
            .expect("reconciled");
        assert!(entries[0].is_pending());
    }

    #[test]
    fn recorded_inputs_must_match_the_whole_row() {
        let single = |identity: &str| RowValue::Single(identity.to_string());
        let full: ParameterRow = [("T1", single("p1")), ("T2", single("p2"))]
            .into_iter()
            .collect();
        let partial: ParameterRow = [("T1", single("p1"))].into_iter().collect();

        // Recorded mapping is a strict subset of the row.
        let current = session(vec![assessor("/e1/assessors/a", "Demo_v1", Some(partial.clone()))]);
        let entries = compare_to_existing(&current, "Demo_v1", &[full.clone()]).expect("reconciled");
        assert!(entries[0].is_pending());

        // Recorded mapping is a strict superset of the row.
        let current = session(vec![assessor("/e1/assessors/a", "Demo_v1", Some(full))]);
        let entries =
            compare_to_existing(&current, "Demo_v1", &[partial.clone()]).expect("reconciled");
        assert!(entries[0].is_pending());

        // An absent optional input is a key with a null value, not a missing key.
        let with_absent: ParameterRow = [("T1", single("p1")), ("T2", RowValue::Absent)]
            .into_iter()
            .collect();
        let current = session(vec![assessor("/e1/assessors/a", "Demo_v1", Some(partial))]);
        let entries =
            compare_to_existing(&current, "Demo_v1", &[with_absent.clone()]).expect("reconciled");
        assert!(entries[0].is_pending());

        let current = session(vec![assessor("/e1/assessors/a", "Demo_v1", Some(with_absent.clone()))]);
        let entries = compare_to_existing(&current, "Demo_v1", &[with_absent]).expect("reconciled");
        assert_eq!(entries[0].existing, vec!["/e1/assessors/a"]);
    }
}
