//! Schema validation for processor documents.
//!
//! Validation never fails: every problem found becomes one human-readable
//! line and the caller decides what a non-empty list means. It runs on the raw
//! document value so missing fields are reported instead of stopping the
//! typed conversion at the first one.
use crate::selection::{
    parse_statement, SelectionDirective, SessionSelection, SELECT_MODES, SELECT_SESSION_MODES,
};
use serde_json::Value;
use std::collections::BTreeSet;

/// Only schema version this crate understands.
pub const SCHEMA_VERSION: &str = "0.1";
const RESOURCE_KINDS: [&str; 3] = ["FILE", "DIR", "DIRJ"];
const FILTER_TYPES: [&str; 1] = ["match"];

struct Section {
    key: &'static str,
    category: &'static str,
    types_field: &'static str,
}

const SECTIONS: [Section; 2] = [
    Section {
        key: "scans",
        category: "scan",
        types_field: "types",
    },
    Section {
        key: "assessors",
        category: "assessor",
        types_field: "proctypes",
    },
];

/// Check a processor document and return every schema error found.
pub fn validate_document(document: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    match document.get("yaml_processor_version") {
        Some(Value::String(version)) if version == SCHEMA_VERSION => {}
        Some(other) => errors.push(format!("Error: Invalid schema num {}", display_value(other))),
        None => errors.push("Error: Invalid schema num None".to_string()),
    }

    let Some(inputs) = document.get("inputs").filter(|value| value.is_object()) else {
        errors.push("Error: Missing inputs section".to_string());
        return errors;
    };
    let Some(xnat) = inputs.get("xnat").filter(|value| value.is_object()) else {
        errors.push("Error: Missing xnat section".to_string());
        return errors;
    };

    let mut seen_names = BTreeSet::new();
    for section in &SECTIONS {
        let Some(entries) = xnat.get(section.key) else {
            continue;
        };
        let Some(entries) = entries.as_array() else {
            errors.push(format!("Error: '{}' must be a list", section.key));
            continue;
        };
        for (position, entry) in entries.iter().enumerate() {
            check_entry(section, position, entry, &mut seen_names, &mut errors);
        }
    }

    if let Some(filters) = xnat.get("filters") {
        check_filters(filters, &mut errors);
    }

    errors
}

fn check_entry(
    section: &Section,
    position: usize,
    entry: &Value,
    seen_names: &mut BTreeSet<String>,
    errors: &mut Vec<String>,
) {
    let category = section.category;
    if !entry.is_object() {
        errors.push(format!(
            "Error: {category} at position {position} is not a mapping"
        ));
        return;
    }
    let name = match entry.get("name").and_then(Value::as_str) {
        Some(name) if !name.trim().is_empty() => name.to_string(),
        _ => {
            errors.push(format!(
                "Error: {category} at position {position} is missing name field"
            ));
            format!("#{position}")
        }
    };
    if entry.get("name").is_some() && !seen_names.insert(name.clone()) {
        errors.push(format!("Error: input '{name}' is declared more than once"));
    }

    if entry.get(section.types_field).and_then(Value::as_str).is_none() {
        errors.push(format!(
            "Error: {category} '{name}' is missing '{}' field",
            section.types_field
        ));
    }

    if let Some(select) = entry.get("select") {
        check_mode(category, &name, "select", select, &SELECT_MODES, errors, |text| {
            SelectionDirective::parse(Some(text)).map(|_| ())
        });
    }
    if let Some(select_session) = entry.get("select-session") {
        check_mode(
            category,
            &name,
            "select-session",
            select_session,
            &SELECT_SESSION_MODES,
            errors,
            |text| SessionSelection::parse(Some(text)).map(|_| ()),
        );
    }
    if let Some(needs_qc) = entry.get("needs_qc") {
        if !needs_qc.is_boolean() {
            errors.push(format!(
                "Error: {category} '{name}': 'needs_qc' must be true or false"
            ));
        }
    }

    match entry.get("resources") {
        None => {}
        Some(Value::Array(resources)) => {
            for (index, resource) in resources.iter().enumerate() {
                check_resource(category, &name, index, resource, errors);
            }
        }
        Some(_) => errors.push(format!(
            "Error: {category} '{name}': 'resources' must be a list"
        )),
    }
}

fn check_mode(
    category: &str,
    name: &str,
    keyword: &str,
    value: &Value,
    valid_modes: &[&str],
    errors: &mut Vec<String>,
    parse: impl Fn(&str) -> Result<(), crate::error::ResolveError>,
) {
    let Some(text) = value.as_str() else {
        errors.push(format!(
            "Error: {category} '{name}': '{keyword}' must be a string"
        ));
        return;
    };
    let statement = match parse_statement(text) {
        Ok(statement) => statement,
        Err(err) => {
            errors.push(format!("Error: {category} '{name}': '{keyword}' {err}"));
            return;
        }
    };
    if !valid_modes.contains(&statement.mode.as_str()) {
        let valid = valid_modes
            .iter()
            .map(|mode| format!("'{mode}'"))
            .collect::<Vec<_>>()
            .join(", ");
        errors.push(format!(
            "Error: {category} '{name}': '{keyword}' has an invalid value '{}'. It must be one of {valid}",
            statement.mode
        ));
        return;
    }
    if let Err(err) = parse(text) {
        errors.push(format!("Error: {category} '{name}': '{keyword}' {err}"));
    }
}

fn check_resource(
    category: &str,
    name: &str,
    index: usize,
    resource: &Value,
    errors: &mut Vec<String>,
) {
    if !resource.is_object() {
        errors.push(format!(
            "Error in {category} '{name}': resource at position {index} is not a mapping"
        ));
        return;
    }
    let label = resource
        .get("varname")
        .and_then(Value::as_str)
        .map(|varname| format!("field '{varname}'"))
        .unwrap_or_else(|| format!("at position {index}"));
    if resource.get("resource").and_then(Value::as_str).is_none() {
        errors.push(format!(
            "Error in {category} '{name}': missing resource from resource {label}"
        ));
    }
    if let Some(required) = resource.get("required") {
        if !required.is_boolean() {
            errors.push(format!(
                "Error in {category} '{name}'; resource field 'required' has an invalid value"
            ));
        }
    }
    if let Some(ftype) = resource.get("ftype") {
        let valid = ftype
            .as_str()
            .is_some_and(|kind| RESOURCE_KINDS.contains(&kind));
        if !valid {
            errors.push(format!(
                "Error in {category} '{name}'; resource field 'ftype' has an invalid value {}",
                display_value(ftype)
            ));
        }
    }
}

fn check_filters(filters: &Value, errors: &mut Vec<String>) {
    let Some(filters) = filters.as_array() else {
        errors.push("Error: 'filters' must be a list".to_string());
        return;
    };
    for (position, filter) in filters.iter().enumerate() {
        match filter.get("type").and_then(Value::as_str) {
            Some(kind) if FILTER_TYPES.contains(&kind) => {}
            Some(kind) => {
                errors.push(format!(
                    "Error: filter at position {position} has unsupported type '{kind}'"
                ));
                continue;
            }
            None => {
                errors.push(format!(
                    "Error: filter at position {position} is missing type field"
                ));
                continue;
            }
        }
        let Some(inputs) = filter.get("inputs").and_then(Value::as_str) else {
            errors.push(format!(
                "Error: filter at position {position} is missing inputs field"
            ));
            continue;
        };
        let count = inputs
            .split(',')
            .filter(|reference| !reference.trim().is_empty())
            .count();
        if count < 2 {
            errors.push(format!(
                "Error: filter at position {position} must list at least two inputs"
            ));
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_document() -> Value {
        json!({
            "yaml_processor_version": "0.1",
            "inputs": {
                "xnat": {
                    "scans": [{
                        "name": "t1",
                        "types": "T1",
                        "select": "foreach",
                        "resources": [{"resource": "NIFTI", "varname": "t1", "ftype": "FILE"}]
                    }],
                    "assessors": [{
                        "name": "fs",
                        "proctypes": "FS7_v1",
                        "select": "from(t1/anat)",
                        "select-session": "prior(1)"
                    }],
                    "filters": [{"type": "match", "inputs": "t1,fs/t1"}]
                }
            }
        })
    }

    #[test]
    fn valid_document_has_no_errors() {
        assert!(validate_document(&valid_document()).is_empty());
    }

    #[test]
    fn wrong_schema_version_is_reported() {
        let mut document = valid_document();
        document["yaml_processor_version"] = json!("3.0");
        assert_eq!(
            validate_document(&document),
            vec!["Error: Invalid schema num 3.0".to_string()]
        );
    }

    #[test]
    fn missing_xnat_stops_early() {
        let document = json!({"yaml_processor_version": "0.1", "inputs": {}});
        assert_eq!(
            validate_document(&document),
            vec!["Error: Missing xnat section".to_string()]
        );
    }

    #[test]
    fn invalid_modes_list_valid_choices() {
        let mut document = valid_document();
        document["inputs"]["xnat"]["scans"][0]["select"] = json!("every");
        document["inputs"]["xnat"]["assessors"][0]["select-session"] = json!("prior(x)");
        let errors = validate_document(&document);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].contains("'select' has an invalid value 'every'"));
        assert!(errors[0].contains("'foreach', 'one', 'some', 'all', 'from'"));
        assert!(errors[1].contains("assessor 'fs': 'select-session'"));
    }

    #[test]
    fn malformed_directive_is_reported() {
        let mut document = valid_document();
        document["inputs"]["xnat"]["scans"][0]["select"] = json!("some(2");
        let errors = validate_document(&document);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("malformed"));
    }

    #[test]
    fn missing_fields_are_collected_not_raised() {
        let document = json!({
            "yaml_processor_version": "0.1",
            "inputs": {
                "xnat": {
                    "scans": [
                        {"types": "T1"},
                        {"name": "t2", "resources": [{"varname": "t2", "required": "yes", "ftype": "ZIP"}]}
                    ],
                    "assessors": [{"name": "t2", "proctypes": "X"}],
                    "filters": [{"type": "regex", "inputs": "a,b"}, {"type": "match", "inputs": "a"}]
                }
            }
        });
        let errors = validate_document(&document);
        let expected = [
            "Error: scan at position 0 is missing name field",
            "Error: scan 't2' is missing 'types' field",
            "Error in scan 't2': missing resource from resource field 't2'",
            "Error in scan 't2'; resource field 'required' has an invalid value",
            "Error in scan 't2'; resource field 'ftype' has an invalid value ZIP",
            "Error: input 't2' is declared more than once",
            "Error: filter at position 0 has unsupported type 'regex'",
            "Error: filter at position 1 must list at least two inputs",
        ];
        assert_eq!(errors, expected.map(str::to_string).to_vec());
    }
}
