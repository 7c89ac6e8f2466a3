//! Core data models used throughout the reply pipeline.
//!
//! Knowledge flows `Document → Chunk → ScoredChunk`; mail flows
//! `Email → OutgoingReply`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tag carried by every chunk produced by the markdown splitter.
pub const MARKDOWN_SECTION: &str = "markdown_section";

/// Raw markdown file read from the knowledge directory.
#[derive(Debug, Clone)]
pub struct Document {
    pub source_path: PathBuf,
    pub text: String,
}

/// One heading in the hierarchy above a chunk (`level` 1 for `#`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    /// Enclosing headings, outermost first. Empty for preamble text.
    pub header_path: Vec<Heading>,
    pub chunk_type: String,
    pub total_chunks: usize,
    pub position: usize,
}

/// A heading-bounded slice of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A stored chunk returned by a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine similarity to the query vector.
    pub score: f32,
}

/// An inbox message with its decoded plain-text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// RFC 5322 `Message-ID`, used for `In-Reply-To`.
    pub message_id: Option<String>,
}

/// A reply ready for the mailbox gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingReply {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub thread_id: String,
    pub in_reply_to: Option<String>,
}

impl OutgoingReply {
    /// Build the reply to `email`, keeping its thread and prefixing the subject.
    pub fn for_email(email: &Email, body: &str) -> Self {
        Self {
            to: email.sender.clone(),
            subject: format!("Re: {}", email.subject),
            body: body.to_string(),
            thread_id: email.thread_id.clone(),
            in_reply_to: email.message_id.clone(),
        }
    }
}
