//! Application-level errors (wraps domain and completion errors)

use thiserror::Error;

use crate::domain::DomainError;
use crate::infrastructure::traits::CompletionError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Transport failure at the completion boundary; never recovered from.
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
