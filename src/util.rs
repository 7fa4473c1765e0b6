use crate::error::ResolveError;
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};
use regex::Regex;
use sha2::Digest;
use std::sync::LazyLock;

static VERSIONED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)_v(\d+)").expect("version pattern compiles"));

fn glob(pattern: &str) -> Result<Glob, ResolveError> {
    Glob::new(pattern).map_err(|err| ResolveError::InvalidArgument {
        statement: pattern.to_string(),
        reason: err.to_string(),
    })
}

/// Compile one shell-style glob (`*`, `?`, `[seq]`, `[!seq]`).
pub fn glob_matcher(pattern: &str) -> Result<GlobMatcher, ResolveError> {
    Ok(glob(pattern)?.compile_matcher())
}

/// Compile several globs into one set; an empty set matches nothing.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, ResolveError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(glob(pattern)?);
    }
    builder.build().map_err(|err| ResolveError::InvalidArgument {
        statement: patterns.join(","),
        reason: err.to_string(),
    })
}

/// Derive a processor type from a spider path.
///
/// `/opt/spiders/Spider_fMRIQA_v2_0_0.py` becomes `fMRIQA_v2`; names without a
/// version suffix are returned as-is.
pub fn proctype_from_spider_path(path: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?.trim();
    let name = file_name.strip_prefix("Spider_").unwrap_or(file_name);
    let name = name.strip_suffix(".py").unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    match VERSIONED_NAME.captures(name) {
        Some(caps) => Some(format!("{}_v{}", &caps[1], &caps[2])),
        None => Some(name.to_string()),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
