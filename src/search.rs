use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::models::ScoredChunk;
use crate::store::KnowledgeStore;
use crate::traits::Embedder;

/// Print the stored chunks closest to `query`.
pub async fn run_search(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let store = KnowledgeStore::open(
        &config.store.db_path(),
        &config.store.collection_name,
        embedder,
    )
    .await?;

    let results = store
        .query(query, limit.unwrap_or(config.chat.top_k))
        .await?;
    store.close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

fn print_result(rank: usize, result: &ScoredChunk) {
    println!(
        "{}. [{:.3}] {}",
        rank,
        result.score,
        section_label(result)
    );
    println!("    source: {}", result.metadata.source_file);
    println!(
        "    chunk: {}/{}",
        result.metadata.position + 1,
        result.metadata.total_chunks
    );
    println!("    excerpt: \"{}\"", excerpt(&result.text, 100));
    println!();
}

/// `"Billing > Refunds"`, or `"(preamble)"` for text above the first heading.
pub fn section_label(result: &ScoredChunk) -> String {
    if result.metadata.header_path.is_empty() {
        return "(preamble)".to_string();
    }
    result
        .metadata
        .header_path
        .iter()
        .map(|h| h.title.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        flat.to_string()
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
