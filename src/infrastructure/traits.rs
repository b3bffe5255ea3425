//! I/O boundary traits for testability
//!
//! These traits abstract external I/O operations, allowing services
//! to be tested with mock implementations.

use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

/// Named prompt templates understood by a [`TextCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PromptName {
    Extract,
    Skills,
    Occupation,
    TaxonomyEnrich,
    TaxonomyRefine,
}

impl PromptName {
    pub const ALL: [PromptName; 5] = [
        PromptName::Extract,
        PromptName::Skills,
        PromptName::Occupation,
        PromptName::TaxonomyEnrich,
        PromptName::TaxonomyRefine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptName::Extract => "extract",
            PromptName::Skills => "skills",
            PromptName::Occupation => "occupation",
            PromptName::TaxonomyEnrich => "taxonomy_enrich",
            PromptName::TaxonomyRefine => "taxonomy_refine",
        }
    }
}

impl fmt::Display for PromptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptName::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unrecognized prompt: {s}"))
    }
}

/// Failure at the text-completion boundary (transport, auth, protocol).
///
/// The taxonomy engine never recovers from these; they propagate to the caller.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("completion returned no text content")]
    EmptyContent,

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("{0}")]
    Unavailable(String),
}

/// Text-completion capability: format a named prompt with the given text(s),
/// send it to a generative service, and return the raw response text.
///
/// Implementations own timeouts and retry policy. The call blocks.
pub trait TextCompletion: Send + Sync {
    fn complete(
        &self,
        prompt: PromptName,
        text: &str,
        auxiliary: Option<&str>,
    ) -> Result<String, CompletionError>;
}

// ============================================================
// REAL IMPLEMENTATIONS
// ============================================================

/// Real filesystem implementation.
#[derive(Debug, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
