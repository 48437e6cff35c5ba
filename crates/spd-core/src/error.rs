//! Unified error types for the SPD workspace
//!
//! [`SpdError`] covers casefile resolution, document lookup, model
//! construction and solver failures so the orchestrator can handle every
//! layer uniformly. Casefile-structural errors are raised before any model
//! is built; solver *infeasibility* is never an error (the model is kept
//! feasible through priced violation variables).

use thiserror::Error;

/// Unified error type for SPD operations.
#[derive(Error, Debug)]
pub enum SpdError {
    /// I/O errors (file access, archive reads, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Casefile could not be located for the requested case ID
    #[error("casefile not found: {0}")]
    CasefileNotFound(String),

    /// More than one casefile matched a case ID that must be unique
    #[error("casefile query not unique: {0}")]
    CasefileQuery(String),

    /// Casefile payload was malformed (bad XML/JSON, wrong root, ...)
    #[error("casefile value error: {0}")]
    CasefileValue(String),

    /// User-supplied options are conflicting or invalid
    #[error("casefile options error: {0}")]
    CasefileOptions(String),

    /// A patch path did not resolve to exactly one element
    #[error("casefile updater lookup error: {0}")]
    CasefileUpdaterLookup(String),

    /// A required attribute is absent from the casefile document
    #[error("missing attribute '{field}' on {entity} '{id}'")]
    MissingAttribute {
        entity: &'static str,
        id: String,
        field: String,
    },

    /// An attribute was present but could not be parsed
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Trader type string outside {GENERATOR, LOAD, NORMALLY_ON_LOAD}
    #[error("unexpected trader type: {0}")]
    UnexpectedTraderType(String),

    /// Trade type string outside the ten known offer types
    #[error("unexpected trade type: {0}")]
    UnexpectedTradeType(String),

    /// Loss-segment geometry fell outside the handled case analysis
    #[error("unhandled loss segment case: {0}")]
    UnhandledLossSegmentCase(String),

    /// Region loss allocation encountered an impossible from/to combination
    #[error("unhandled region allocation: {0}")]
    UnhandledRegionAllocation(String),

    /// Solver terminated without an acceptable status
    #[error("solver failure: {status}")]
    SolverFailure { status: String },
}

/// Convenience alias for results using [`SpdError`].
pub type SpdResult<T> = Result<T, SpdError>;

impl SpdError {
    /// Shorthand for a [`SpdError::MissingAttribute`].
    pub fn missing(entity: &'static str, id: impl Into<String>, field: impl Into<String>) -> Self {
        SpdError::MissingAttribute {
            entity,
            id: id.into(),
            field: field.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpdError::SolverFailure {
            status: "Infeasible".to_string(),
        };
        assert!(err.to_string().contains("solver failure"));
        assert!(err.to_string().contains("Infeasible"));
    }

    #[test]
    fn test_missing_attribute_display() {
        let err = SpdError::missing("Trader", "AGLHAL", "@SemiDispatch");
        assert_eq!(
            err.to_string(),
            "missing attribute '@SemiDispatch' on Trader 'AGLHAL'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SpdError = io_err.into();
        assert!(matches!(err, SpdError::Io(_)));
    }
}
