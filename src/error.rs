//! Error taxonomy for the reply pipeline.
//!
//! Every library operation returns [`Result`]. Each variant names the
//! collaborator that failed so the interactive session can decide whether
//! the failure is fatal (authentication at startup) or recoverable (a
//! failed generate/send command).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The knowledge directory is missing or holds no matching files.
    #[error("knowledge source not found: {path} (pattern '{pattern}')")]
    SourceNotFound { path: PathBuf, pattern: String },

    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("reply generation failed: {0}")]
    Generation(String),

    #[error("mailbox authentication failed: {0}")]
    Authentication(String),

    #[error("failed to fetch mail: {0}")]
    Fetch(String),

    #[error("failed to send reply: {0}")]
    Send(String),

    /// Operator input at the selection prompt was not a listed email.
    #[error("invalid selection '{input}': choose 1..={count} or 'q'")]
    InvalidSelection { input: String, count: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::StoreUnavailable(e.to_string())
    }
}

/// Render a transport error, calling out timeouts explicitly.
pub(crate) fn describe_http_error(e: &reqwest::Error, timeout: Duration) -> String {
    if e.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs())
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}
