//! Review Input Files

use serde::{Deserialize, Serialize};

/// A candidate file submitted for review.
///
/// Files are never mutated by the pipeline. When content has to be cut to fit
/// the budget the optimizer produces a derived copy via [`ReviewFile::truncated`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFile {
    /// Path relative to the review root, unique within one request
    pub path: String,
    /// File content, `None` when the file could not be read
    pub content: Option<String>,
    /// Size on disk in bytes
    pub size_bytes: u64,
    /// Set on derived copies produced by truncation
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl ReviewFile {
    /// Create a file whose size is the UTF-8 length of its content
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            path: path.into(),
            size_bytes: content.len() as u64,
            content: Some(content),
            truncated: false,
        }
    }

    /// Create a file with an explicit size (e.g. from filesystem metadata)
    pub fn with_size(path: impl Into<String>, content: Option<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            content,
            size_bytes,
            truncated: false,
        }
    }

    /// Content as a string slice, empty when missing
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Number of characters in the content
    pub fn char_len(&self) -> usize {
        self.content.as_deref().map_or(0, |c| c.chars().count())
    }

    /// Derived copy carrying replacement content and its size
    pub fn truncated(&self, content: String) -> Self {
        Self {
            path: self.path.clone(),
            size_bytes: content.len() as u64,
            content: Some(content),
            truncated: true,
        }
    }
}
