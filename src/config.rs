//! Resolver configuration helpers.
//!
//! The config carries the two resolution policies, the QC status vocabulary
//! and the imaging store host used to build download locators.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Current schema version for resolver config files.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
const DEFAULT_HOST: &str = "https://xnat.example.org";

fn default_true() -> bool {
    true
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Behaviors of the matrix stage that are kept as explicit switches.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResolutionPolicy {
    /// Cut columns attached to one iteration source to the shortest column
    /// instead of failing with `MisalignedColumns`.
    #[serde(default = "default_true")]
    pub truncate_to_shortest: bool,
    /// Drop unusable scans from candidate lists of `all` inputs.
    #[serde(default = "default_true")]
    pub exclude_unusable_on_all: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            truncate_to_shortest: true,
            exclude_unusable_on_all: true,
        }
    }
}

/// Status values of the imaging store that gate readiness.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct QcVocabulary {
    /// Scan quality that marks a scan unusable.
    pub unusable_scan_quality: String,
    /// Processing statuses of assessors still in flight.
    pub open_proc_statuses: Vec<String>,
    /// Processing status of assessors waiting for their own inputs.
    pub need_inputs_status: String,
    /// QC statuses that mean the assessor will be regenerated.
    pub not_ready_qc_statuses: Vec<String>,
    /// QC statuses that still wait for a reviewer.
    pub needs_qc_statuses: Vec<String>,
    /// Tokens that mark a failed QC when found in the first word of the status.
    pub bad_qc_tokens: Vec<String>,
}

impl Default for QcVocabulary {
    fn default() -> Self {
        Self {
            unusable_scan_quality: "unusable".to_string(),
            open_proc_statuses: strings(&[
                "NEED_TO_RUN",
                "UPLOADING",
                "JOB_RUNNING",
                "READY_TO_COMPLETE",
                "JOB_FAILED",
            ]),
            need_inputs_status: "NEED_INPUTS".to_string(),
            not_ready_qc_statuses: strings(&["Job Pending", "Reproc", "Rerun"]),
            needs_qc_statuses: strings(&["Needs QA", "Failed-needs reprocessing"]),
            bad_qc_tokens: strings(&["Failed", "Bad", "Poor", "Do Not Run"]),
        }
    }
}

impl QcVocabulary {
    pub fn is_unusable_scan(&self, quality: Option<&str>) -> bool {
        quality == Some(self.unusable_scan_quality.as_str())
    }

    /// Processing has not finished or is waiting on its own inputs.
    pub fn is_proc_not_ready(&self, proc_status: Option<&str>) -> bool {
        let Some(status) = proc_status else {
            return false;
        };
        status == self.need_inputs_status || self.open_proc_statuses.iter().any(|s| s == status)
    }

    pub fn is_qc_not_ready(&self, qc_status: Option<&str>) -> bool {
        qc_status.is_some_and(|status| self.not_ready_qc_statuses.iter().any(|s| s == status))
    }

    pub fn is_awaiting_qc(&self, qc_status: Option<&str>) -> bool {
        qc_status.is_some_and(|status| self.needs_qc_statuses.iter().any(|s| s == status))
    }

    /// Case-insensitive containment of a bad token in the first word of the status.
    pub fn is_bad_qc(&self, qc_status: Option<&str>) -> bool {
        let Some(first_word) = qc_status.and_then(|status| status.split(' ').next()) else {
            return false;
        };
        let first_word = first_word.to_lowercase();
        self.bad_qc_tokens
            .iter()
            .any(|token| first_word.contains(&token.to_lowercase()))
    }
}

/// Resolver configuration file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    pub schema_version: u32,
    pub host: String,
    #[serde(default)]
    pub policy: ResolutionPolicy,
    #[serde(default)]
    pub qc: QcVocabulary,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        default_config()
    }
}

/// Config used when no config file is given.
pub fn default_config() -> ResolverConfig {
    ResolverConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        host: DEFAULT_HOST.to_string(),
        policy: ResolutionPolicy::default(),
        qc: QcVocabulary::default(),
    }
}

/// Render a pretty JSON config stub.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&default_config()).context("serialize config stub")
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<ResolverConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ResolverConfig =
        serde_json::from_slice(&bytes).context("parse resolver config JSON")?;
    validate_config(&config).with_context(|| format!("validate config {}", path.display()))?;
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &ResolverConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize resolver config")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn validate_config(config: &ResolverConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported resolver config schema_version {}",
            config.schema_version
        ));
    }
    let host = config.host.trim();
    if host.is_empty() {
        return Err(anyhow!("host must be non-empty"));
    }
    if host.ends_with('/') {
        return Err(anyhow!("host must not end with '/' (got {host:?})"));
    }
    let qc = &config.qc;
    if qc.unusable_scan_quality.trim().is_empty() {
        return Err(anyhow!("qc.unusable_scan_quality must be non-empty"));
    }
    if qc.need_inputs_status.trim().is_empty() {
        return Err(anyhow!("qc.need_inputs_status must be non-empty"));
    }
    let lists = [
        ("qc.open_proc_statuses", &qc.open_proc_statuses),
        ("qc.not_ready_qc_statuses", &qc.not_ready_qc_statuses),
        ("qc.needs_qc_statuses", &qc.needs_qc_statuses),
        ("qc.bad_qc_tokens", &qc.bad_qc_tokens),
    ];
    for (label, values) in lists {
        if values.iter().any(|value| value.trim().is_empty()) {
            return Err(anyhow!("{label} entries must be non-empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
