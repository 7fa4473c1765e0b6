//! Shared fixtures for integration tests.
//!
//! One subject with three sessions. The processor is longitudinal: it pairs a
//! current T1 with the current FreeSurfer run and the baseline FreeSurfer run,
//! and requires the current run to have been built from the chosen T1.
#![allow(dead_code)]

use proc_inputs::document::ProcessorDocument;
use proc_inputs::session::{Session, SessionSnapshot};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const PROCTYPE: &str = "LongiFS_v1";

pub fn processor_value() -> Value {
    json!({
        "yaml_processor_version": "0.1",
        "inputs": {
            "default": {"spider_path": "/opt/spiders/Spider_LongiFS_v1_2_0.py"},
            "xnat": {
                "scans": [
                    {"name": "t1", "types": "T1*", "resources": [
                        {"resource": "NIFTI", "varname": "t1_nii", "fdest": "t1.nii.gz"}
                    ]}
                ],
                "assessors": [
                    {"name": "fs_now", "proctypes": "FS7_v1", "resources": [
                        {"resource": "SUBJ", "varname": "fs_now_dir", "ftype": "DIR", "fdest": "fs_now"}
                    ]},
                    {"name": "fs_base", "proctypes": "FS7_v1", "select-session": "first",
                     "needs_qc": true, "resources": [
                        {"resource": "SUBJ", "varname": "fs_base_dir", "ftype": "DIR", "fdest": "fs_base"}
                    ]}
                ],
                "filters": [{"type": "match", "inputs": "t1,fs_now/t1"}]
            }
        }
    })
}

pub fn snapshot_value() -> Value {
    json!({
        "subject": "S01",
        "sessions": [
            {
                "label": "E3",
                "created_epoch_ms": 3000,
                "scans": [
                    {"path": "/p/S01/E3/scans/1", "type": "T1", "quality": "usable",
                     "resources": {"NIFTI": ["t1.nii.gz"]}},
                    {"path": "/p/S01/E3/scans/2", "type": "T1_rep", "quality": "usable",
                     "resources": {"NIFTI": ["t1.nii.gz"]}}
                ],
                "assessors": [
                    {"path": "/p/S01/E3/assessors/fs7", "type": "FS7_v1",
                     "proc_status": "COMPLETE", "qc_status": "Passed",
                     "resources": {"SUBJ": ["mri", "stats"]},
                     "inputs": {"t1": "/p/S01/E3/scans/2"}},
                    {"path": "/p/S01/E3/assessors/longi", "type": PROCTYPE,
                     "proc_status": "COMPLETE", "qc_status": "Passed",
                     "inputs": existing_row()}
                ]
            },
            {
                "label": "E2",
                "created_epoch_ms": 2000,
                "scans": [
                    {"path": "/p/S01/E2/scans/1", "type": "T1", "quality": "usable"}
                ]
            },
            {
                "label": "E1",
                "created_epoch_ms": 1000,
                "scans": [
                    {"path": "/p/S01/E1/scans/1", "type": "T1", "quality": "usable",
                     "resources": {"NIFTI": ["t1.nii.gz"]}}
                ],
                "assessors": [
                    {"path": "/p/S01/E1/assessors/fs7", "type": "FS7_v1",
                     "proc_status": "COMPLETE", "qc_status": "Needs QA",
                     "resources": {"SUBJ": ["mri", "stats"]},
                     "inputs": {"t1": "/p/S01/E1/scans/1"}}
                ]
            }
        ]
    })
}

/// The only row that survives the match filter for session E3.
pub fn existing_row() -> Value {
    json!({
        "t1": "/p/S01/E3/scans/2",
        "fs_now": "/p/S01/E3/assessors/fs7",
        "fs_base": "/p/S01/E1/assessors/fs7"
    })
}

pub fn document_from(value: Value) -> ProcessorDocument {
    ProcessorDocument::from_value(value).expect("processor document")
}

pub fn document() -> ProcessorDocument {
    document_from(processor_value())
}

pub fn sessions_from(value: Value) -> Vec<Session> {
    let snapshot: SessionSnapshot = serde_json::from_value(value).expect("session snapshot");
    snapshot.sessions
}

pub fn sessions() -> Vec<Session> {
    sessions_from(snapshot_value())
}

/// Snapshot with the existing LongiFS assessor removed.
pub fn sessions_without_existing() -> Vec<Session> {
    let mut sessions = sessions();
    sessions[0]
        .assessors
        .retain(|assessor| assessor.artefact_type != PROCTYPE);
    sessions
}

/// Write the processor as YAML and the snapshot as JSON into `dir`.
pub fn write_fixture(dir: &Path, snapshot: &Value) -> (PathBuf, PathBuf) {
    let processor = dir.join("longi_fs.yaml");
    let yaml = serde_yaml::to_string(&processor_value()).expect("processor yaml");
    std::fs::write(&processor, yaml).expect("write processor");
    let sessions = dir.join("sessions.json");
    let json = serde_json::to_string_pretty(snapshot).expect("snapshot json");
    std::fs::write(&sessions, json).expect("write sessions");
    (processor, sessions)
}
