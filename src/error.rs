//! Error types for flag evaluation
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

use crate::models::FlagType;

// == Flag Error Enum ==
/// Unified error type for the flag client.
///
/// `NotFound` and `Authentication` must stay distinct from the generic
/// `Evaluation` kind: typed accessors default on the former and propagate
/// the latter.
#[derive(Error, Debug)]
pub enum FlagError {
    /// The evaluation service has no flag with this key
    #[error("Flag not found: {0}")]
    NotFound(String),

    /// The API key was rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Transport, timeout, protocol or any other unexpected failure
    #[error("Flag evaluation failed: {0}")]
    Evaluation(#[source] anyhow::Error),

    /// A flag value could not be read as the requested type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: FlagType, actual: FlagType },

    /// Client construction was given unusable settings
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FlagError {
    /// Builds an `Evaluation` error from a plain message.
    pub fn evaluation(message: impl Into<String>) -> Self {
        FlagError::Evaluation(anyhow::anyhow!(message.into()))
    }

    /// Returns true for the error kinds a typed accessor may not default on.
    pub fn is_authentication(&self) -> bool {
        matches!(self, FlagError::Authentication(_))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the flag client.
pub type Result<T> = std::result::Result<T, FlagError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_evaluation_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let err = FlagError::Evaluation(anyhow::Error::new(io).context("request failed"));

        assert_eq!(err.to_string(), "Flag evaluation failed: request failed");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = FlagError::TypeMismatch {
            expected: FlagType::Boolean,
            actual: FlagType::String,
        };
        assert_eq!(err.to_string(), "Type mismatch: expected BOOLEAN, got STRING");
    }

    #[test]
    fn test_is_authentication() {
        assert!(FlagError::Authentication("bad key".into()).is_authentication());
        assert!(!FlagError::NotFound("f".into()).is_authentication());
        assert!(!FlagError::evaluation("boom").is_authentication());
    }
}
