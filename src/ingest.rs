//! Indexing pipeline orchestration.
//!
//! Coordinates the one-shot index flow: knowledge directory → markdown
//! splitting → embedding → collection replacement. Any failure aborts the
//! run and leaves the previously indexed collection in place.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::chunk::split_markdown;
use crate::config::Config;
use crate::connector_fs;
use crate::models::{Chunk, Document};
use crate::store::{IndexReport, KnowledgeStore};
use crate::traits::Embedder;

pub async fn run_index(config: &Config, embedder: Arc<dyn Embedder>) -> Result<IndexReport> {
    let docs = connector_fs::scan_knowledge_dir(&config.knowledge)?;
    let chunks = split_documents(&docs, &config.knowledge.split_levels);
    if chunks.is_empty() {
        bail!(
            "No sections to index under {}: every matching file is blank. \
             The previous collection was left unchanged.",
            config.knowledge.source_dir.display()
        );
    }

    let store = KnowledgeStore::create(
        &config.store.db_path(),
        &config.store.collection_name,
        embedder,
        config.embedding.batch_size,
    )
    .await?;

    let report = store
        .index(&chunks)
        .await
        .context("Indexing failed; the previous collection was left unchanged")?;
    store.close().await;

    println!("index {}", report.collection);
    println!("  documents: {}", docs.len());
    println!("  chunks stored: {}", report.chunks);
    println!("  chunks replaced: {}", report.replaced);
    println!("  location: {}", config.store.db_path().display());
    println!("ok");

    Ok(report)
}

/// Split every document, preserving document order then section order.
pub fn split_documents(docs: &[Document], levels: &[usize]) -> Vec<Chunk> {
    let mut all = Vec::new();
    for doc in docs {
        let source = doc.source_path.display().to_string();
        let chunks = split_markdown(&source, &doc.text, levels);
        info!(source = %source, chunks = chunks.len(), "split document");
        all.extend(chunks);
    }
    all
}
