//! Retrieval-augmented reply drafting.
//!
//! For each question the [`Responder`] pulls the `top_k` closest sections
//! from the [`KnowledgeStore`], lays them out as numbered context in the user
//! message, and asks the chat model for a single answer. Company name and
//! context go in the system message. Nothing is retried here; errors from
//! retrieval or generation reach the caller unchanged.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::{CompanyConfig, StoreConfig};
use crate::error::Result;
use crate::models::ScoredChunk;
use crate::store::KnowledgeStore;
use crate::traits::{ChatMessage, ChatModel, Embedder, ReplyGenerator};

pub struct Responder {
    db_path: PathBuf,
    collection: String,
    embedder: Arc<dyn Embedder>,
    /// Opened on the first draft, so a missing index fails that draft only.
    store: OnceCell<KnowledgeStore>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
    company: CompanyConfig,
}

impl Responder {
    pub fn new(
        store: &StoreConfig,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
        company: CompanyConfig,
    ) -> Self {
        Self {
            db_path: store.db_path(),
            collection: store.collection_name.clone(),
            embedder,
            store: OnceCell::new(),
            chat,
            top_k,
            company,
        }
    }

    async fn store(&self) -> Result<&KnowledgeStore> {
        self.store
            .get_or_try_init(|| {
                KnowledgeStore::open(&self.db_path, &self.collection, self.embedder.clone())
            })
            .await
    }
}

#[async_trait]
impl ReplyGenerator for Responder {
    async fn generate_reply(&self, question: &str) -> Result<String> {
        let context = self.store().await?.query(question, self.top_k).await?;
        debug!(
            retrieved = context.len(),
            top_score = context.first().map(|c| c.score),
            "retrieved context"
        );

        let messages = build_messages(&self.company, question, &context);
        let answer = self.chat.complete(&messages).await?;

        info!(model = self.chat.model_name(), chars = answer.len(), "draft generated");
        Ok(answer)
    }
}

/// System + user messages for one grounded answer.
pub fn build_messages(
    company: &CompanyConfig,
    question: &str,
    context: &[ScoredChunk],
) -> Vec<ChatMessage> {
    let mut system = String::from(
        "You answer customer emails using only the knowledge-base excerpts you are given. \
         If the excerpts do not contain the answer, say that you don't know rather than \
         inventing one. Reply with the email body only.",
    );
    if let Some(name) = company.name.as_deref() {
        system.push_str(&format!("\n\nYou write on behalf of {}.", name));
    }
    if !company.context.trim().is_empty() {
        system.push_str("\n\nCompany background:\n");
        system.push_str(company.context.trim());
    }

    let mut user = String::from("Knowledge-base excerpts:\n");
    if context.is_empty() {
        user.push_str("(none found)\n");
    }
    for (i, chunk) in context.iter().enumerate() {
        user.push_str(&format!("\n[{}] {}\n", i + 1, chunk.text.trim()));
    }
    user.push_str(&format!("\nQuestion:\n{}\n\nAnswer:", question.trim()));

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
