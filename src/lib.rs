//! # mailrag
//!
//! Drafts replies to recent inbox messages from a local markdown knowledge
//! base, and sends them on the original thread.
//!
//! ## Architecture
//!
//! ```text
//!  index phase (run separately)
//!  ┌──────────────┐   ┌─────────┐   ┌──────────────────┐
//!  │ connector_fs │──▶│  chunk  │──▶│ store (SQLite +  │
//!  │  *.md files  │   │ by #/## │   │ OpenAI vectors)  │
//!  └──────────────┘   └─────────┘   └────────┬─────────┘
//!                                            │ top-k
//!  query phase                               ▼
//!  ┌──────────┐   ┌──────────┐   ┌──────────────────┐
//!  │  gmail   │──▶│ session  │──▶│    responder     │
//!  │ list/send│◀──│ (prompt) │◀──│ (OpenAI chat)    │
//!  └──────────┘   └──────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mailrag index                       # embed the knowledge directory
//! mailrag search "refund policy"      # check retrieval
//! mailrag session                     # answer the latest emails
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`traits`] | Service seams (embedder, chat model, mailbox) |
//! | [`connector_fs`] | Knowledge directory loader |
//! | [`chunk`] | Markdown heading splitter |
//! | [`embedding`] | OpenAI embeddings + vector utilities |
//! | [`store`] | Persisted vector collection |
//! | [`chat`] | OpenAI chat completions |
//! | [`responder`] | Retrieval-augmented reply drafting |
//! | [`gmail`] | Gmail mailbox gateway |
//! | [`session`] | Interactive reply session |
//! | [`ingest`] / [`search`] | `index` and `search` commands |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod error;
pub mod gmail;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod responder;
pub mod search;
pub mod session;
pub mod store;
pub mod traits;
