//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent structural violations of the taxonomy tree.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed tree at '{path}': {reason}")]
    MalformedTree { path: String, reason: String },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("prompt validation failed for '{leaf}': {reason}")]
    PromptValidation { leaf: String, reason: String },
}

impl DomainError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedTree {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
