use super::*;

#[test]
fn stub_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested/resolver.json");
    write_config(&path, &default_config()).expect("write config");
    let loaded = load_config(&path).expect("load config");
    assert_eq!(loaded, default_config());
    assert!(config_stub().expect("stub").contains("\"truncate_to_shortest\": true"));
}

#[test]
fn omitted_sections_take_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("resolver.json");
    std::fs::write(
        &path,
        r#"{"schema_version": 1, "host": "https://store", "policy": {"truncate_to_shortest": false}}"#,
    )
    .expect("write");
    let config = load_config(&path).expect("load config");
    assert!(!config.policy.truncate_to_shortest);
    assert!(config.policy.exclude_unusable_on_all);
    assert_eq!(config.qc, QcVocabulary::default());
}

#[test]
fn rejects_wrong_schema_and_trailing_slash() {
    let mut config = default_config();
    config.schema_version = 9;
    let err = validate_config(&config).expect_err("schema");
    assert!(err.to_string().contains("schema_version 9"));

    let mut config = default_config();
    config.host = "https://store/".to_string();
    let err = validate_config(&config).expect_err("slash");
    assert!(err.to_string().contains("must not end with '/'"));
}

#[test]
fn unknown_fields_fail_to_parse() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("resolver.json");
    std::fs::write(&path, r#"{"schema_version": 1, "host": "h", "hosts": []}"#).expect("write");
    let err = load_config(&path).expect_err("unknown field");
    assert!(format!("{err:#}").contains("hosts"));
}

#[test]
fn qc_vocabulary_classifies_statuses() {
    let qc = QcVocabulary::default();
    assert!(qc.is_unusable_scan(Some("unusable")));
    assert!(!qc.is_unusable_scan(Some("usable")));
    assert!(!qc.is_unusable_scan(None));

    assert!(qc.is_proc_not_ready(Some("JOB_RUNNING")));
    assert!(qc.is_proc_not_ready(Some("NEED_INPUTS")));
    assert!(!qc.is_proc_not_ready(Some("COMPLETE")));

    assert!(qc.is_qc_not_ready(Some("Rerun")));
    assert!(qc.is_awaiting_qc(Some("Needs QA")));
    assert!(qc.is_bad_qc(Some("failed segmentation")));
    assert!(qc.is_bad_qc(Some("POOR")));
    assert!(!qc.is_bad_qc(Some("Passed")));
    assert!(!qc.is_bad_qc(Some("Passed but Bad")));
}
