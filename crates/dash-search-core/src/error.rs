//! Error types for the dashboard search core.
//!
//! Missing or corrupt preferences and undefined feature flags are not errors;
//! they resolve to defaults. What remains here is what a caller can act on.

use thiserror::Error;

/// Result type alias for search core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the search core
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported by the active search mode: {0}")]
    Unsupported(&'static str),

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    #[error("Preference storage error: {0}")]
    Storage(String),

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error type string (for JSON output and exit reporting)
    #[must_use]
    pub const fn error_type(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Io(_) => "OS_ERROR",
            Self::Serialization(_) => "TYPE_ERROR",
        }
    }

    /// Returns whether the caller can fix the problem by changing its input
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::Unsupported(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_mapping_exhaustive() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::InvalidArgument("x".into()), "INVALID_ARGUMENT"),
            (Error::Unsupported("add_tag"), "UNSUPPORTED"),
            (Error::Storage("x".into()), "STORAGE_ERROR"),
            (Error::Io(std::io::Error::other("x")), "OS_ERROR"),
            (
                Error::Serialization(serde_json::from_str::<bool>("nope").unwrap_err()),
                "TYPE_ERROR",
            ),
        ];

        for (err, expected_type) in &cases {
            assert_eq!(
                err.error_type(),
                *expected_type,
                "Error {err:?} should map to {expected_type}"
            );
        }
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::InvalidArgument("x".into()).is_recoverable());
        assert!(Error::Unsupported("set_sort").is_recoverable());
        assert!(!Error::Storage("disk full".into()).is_recoverable());
        assert!(!Error::Io(std::io::Error::other("x")).is_recoverable());
    }

    #[test]
    fn unsupported_message_names_operation() {
        let err = Error::Unsupported("set_include_panels");
        assert_eq!(
            err.to_string(),
            "Operation not supported by the active search mode: set_include_panels"
        );
    }
}
