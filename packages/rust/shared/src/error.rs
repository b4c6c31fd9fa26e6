//! Error types for the QA agent.
//!
//! Library crates use [`QaAgentError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all QA agent operations.
#[derive(Debug, thiserror::Error)]
pub enum QaAgentError {
    /// Retrieval was attempted before any chunk was inserted.
    #[error("knowledge base is empty: ingest documents before querying")]
    EmptyKnowledgeBase,

    /// A document could not be turned into text. The document is skipped.
    #[error("malformed input document {name}: {reason}")]
    MalformedInputDocument { name: String, reason: String },

    /// A generated test case failed parse or grounding validation.
    ///
    /// Only ever logged; the case is dropped from the result set.
    #[error("ungrounded test case {test_id} discarded: {reason}")]
    UngroundedGenerationDiscarded { test_id: String, reason: String },

    /// The generation backend is unreachable or returned an unusable response.
    #[error("generation backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Embedding provider error.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Structured-text parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad parameters, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QaAgentError>;

impl QaAgentError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-document error.
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInputDocument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an ungrounded-generation error for logging a discarded case.
    pub fn ungrounded(test_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UngroundedGenerationDiscarded {
            test_id: test_id.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error should be reported to the caller of a pipeline
    /// operation rather than absorbed into degraded output.
    pub fn is_caller_visible(&self) -> bool {
        !matches!(
            self,
            Self::BackendUnavailable(_) | Self::UngroundedGenerationDiscarded { .. }
        )
    }
}
