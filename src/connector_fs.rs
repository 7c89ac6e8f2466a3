//! Knowledge directory loader.
//!
//! Walks `knowledge.source_dir`, keeps files matching `knowledge.glob`, and
//! returns one [`Document`] per file sorted by path. A missing directory or
//! a directory with no matching files is an error, never an empty result:
//! indexing nothing would silently wipe the collection.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::KnowledgeConfig;
use crate::error::{Error, Result};
use crate::models::Document;

pub fn scan_knowledge_dir(config: &KnowledgeConfig) -> Result<Vec<Document>> {
    load_documents(&config.source_dir, &config.glob)
}

pub fn load_documents(root: &Path, pattern: &str) -> Result<Vec<Document>> {
    let not_found = || Error::SourceNotFound {
        path: root.to_path_buf(),
        pattern: pattern.to_string(),
    };

    if !root.is_dir() {
        return Err(not_found());
    }

    let include_set = build_globset(&[pattern.to_string()])?;
    let exclude_set = build_globset(&["**/.git/**".to_string()])?;

    let mut docs = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = text.len(), "loaded document");
        docs.push(Document {
            source_path: path.to_path_buf(),
            text,
        });
    }

    if docs.is_empty() {
        return Err(not_found());
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.source_path.cmp(&b.source_path));

    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}
