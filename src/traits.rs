//! Seams between the pipeline and the services it delegates to.
//!
//! Each hosted collaborator sits behind a trait so the components can be
//! constructed once at startup and handed their dependencies:
//!
//! ```text
//!  connector_fs ─▶ chunk ─▶ KnowledgeStore ◀── dyn Embedder
//!                                 │
//!                                 ▼
//!        dyn ChatModel ──▶  Responder (impl ReplyGenerator)
//!                                 │
//!                                 ▼
//!        dyn Mailbox   ──▶  Session
//! ```
//!
//! Production implementations live in [`crate::embedding`],
//! [`crate::chat`], and [`crate::gmail`].

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Email, OutgoingReply};

/// Turns text into fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the vector dimensionality every call must produce.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input in input order.
    ///
    /// Fails with [`Error::EmbeddingService`](crate::error::Error::EmbeddingService).
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// One message in a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A hosted chat-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Return the assistant's answer to `messages`.
    ///
    /// Fails with [`Error::Generation`](crate::error::Error::Generation),
    /// including when the service returns no content.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// An authenticated mailbox.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Up to `limit` most recent inbox messages, newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<Email>>;

    /// Submit `reply` on its original thread.
    async fn send_reply(&self, reply: &OutgoingReply) -> Result<()>;
}

/// Produces a draft answer for a free-text question.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, question: &str) -> Result<String>;
}
