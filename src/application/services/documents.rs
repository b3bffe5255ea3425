//! Document service
//!
//! Reads and writes the text and JSON documents the commands work on.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::FileSystem;

/// Service for reading and writing input and output documents.
pub struct DocumentService {
    fs: Arc<dyn FileSystem>,
}

impl DocumentService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    pub fn read_text(&self, path: &Path) -> ApplicationResult<String> {
        debug!("read_text: path={}", path.display());
        self.fs.read_to_string(path).with_path_context("read", path)
    }

    /// Reads and parses a JSON document.
    pub fn read_json(&self, path: &Path) -> ApplicationResult<Value> {
        let content = self.read_text(path)?;
        serde_json::from_str(&content).with_path_context("parse JSON", path)
    }

    /// Writes `content`, creating parent directories as needed.
    pub fn write_text(&self, path: &Path, content: &str) -> ApplicationResult<()> {
        debug!("write_text: path={}, {} bytes", path.display(), content.len());
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs.write(path, content).with_path_context("write", path)
    }

    /// Writes `value` as pretty-printed JSON with a trailing newline.
    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> ApplicationResult<()> {
        let content = to_pretty_json(value)?;
        self.write_text(path, &content)
    }
}

/// Pretty JSON with a trailing newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> ApplicationResult<String> {
    serde_json::to_string_pretty(value)
        .map(|s| s + "\n")
        .map_err(|e| ApplicationError::OperationFailed {
            context: "serialize JSON".into(),
            source: Box::new(e),
        })
}

/// Splits plain text into blocks: one per non-empty line.
pub fn text_blocks(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
}
