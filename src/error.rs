//! Error taxonomy for input resolution.
//!
//! Only [`ResolveError::NeedsInput`] is a routine per-row signal; every other
//! variant aborts processing for the affected subject.
use std::fmt;
use thiserror::Error;

/// Why an accepted row cannot be materialized yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NeedsInputReason {
    /// Scan quality marks it unusable.
    NotUsable,
    /// Assessor is still processing or waiting on reprocessing.
    NotReady,
    /// Assessor is waiting on a QC decision.
    NeedsQc,
    /// Assessor failed QC.
    BadQc,
    /// The artefact has no resource with this name.
    MissingResource(String),
    /// The row names an artefact that is not in the catalog.
    UnknownArtefact,
}

impl fmt::Display for NeedsInputReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedsInputReason::NotUsable => write!(f, "Not Usable"),
            NeedsInputReason::NotReady => write!(f, "Not Ready"),
            NeedsInputReason::NeedsQc => write!(f, "Needs QC"),
            NeedsInputReason::BadQc => write!(f, "Bad QC"),
            NeedsInputReason::MissingResource(resource) => write!(f, "No Resource {resource}"),
            NeedsInputReason::UnknownArtefact => write!(f, "Unknown Artefact"),
        }
    }
}

/// Canonical error type for the resolution core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("statement {statement:?} is malformed")]
    MalformedSelection { statement: String },

    #[error("{category} mode {mode:?} is not supported")]
    UnsupportedMode {
        category: &'static str,
        mode: String,
    },

    #[error("statement {statement:?}: {reason}")]
    InvalidArgument { statement: String, reason: String },

    #[error("input {name:?} is declared more than once")]
    DuplicateInput { name: String },

    #[error("input {input:?} has invalid reference {reference:?}: {reason}")]
    InvalidReference {
        input: String,
        reference: String,
        reason: &'static str,
    },

    #[error("sessions are not strictly descending by creation time at index {index}")]
    OrderingViolation { index: usize },

    #[error("session {label:?} is not in the supplied session list")]
    UnknownSession { label: String },

    #[error("columns attached to {source_input:?} have unequal lengths {lengths:?}")]
    MisalignedColumns {
        source_input: String,
        lengths: Vec<usize>,
    },

    #[error("processor type is neither given nor derivable from inputs.default.spider_path")]
    MissingProctype,

    #[error("{input}: {reason}")]
    NeedsInput {
        input: String,
        reason: NeedsInputReason,
    },
}

impl ResolveError {
    /// True for the routine "not ready yet" signal callers skip per row.
    pub fn is_needs_input(&self) -> bool {
        matches!(self, ResolveError::NeedsInput { .. })
    }

    pub(crate) fn needs_input(input: &str, reason: NeedsInputReason) -> Self {
        ResolveError::NeedsInput {
            input: input.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_input_is_the_only_routine_error() {
        let routine = ResolveError::needs_input("t1", NeedsInputReason::NotUsable);
        assert!(routine.is_needs_input());
        assert_eq!(routine.to_string(), "t1: Not Usable");

        let fatal = ResolveError::OrderingViolation { index: 1 };
        assert!(!fatal.is_needs_input());
    }

    #[test]
    fn missing_resource_names_the_resource() {
        let err = ResolveError::needs_input(
            "fs",
            NeedsInputReason::MissingResource("SUBJ".to_string()),
        );
        assert_eq!(err.to_string(), "fs: No Resource SUBJ");
    }
}
