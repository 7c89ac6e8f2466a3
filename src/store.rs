//! Persisted vector collection.
//!
//! A [`KnowledgeStore`] owns one named collection inside the SQLite file at
//! `<persist_directory>/store.sqlite`. Vectors are stored as little-endian
//! BLOBs and searched by brute-force cosine similarity, which is plenty for
//! a hand-written knowledge base.
//!
//! # Re-indexing
//!
//! [`index`](KnowledgeStore::index) **replaces** the collection. All chunks
//! are embedded first; only when every embedding call has succeeded is the
//! old collection deleted and the new one written, inside one transaction.
//! A failed run therefore leaves the previous index untouched and never a
//! partial one.

use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::embedding::{blob_to_vec, check_shape, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{Chunk, ChunkMetadata, ScoredChunk};
use crate::traits::Embedder;

/// Summary of an indexing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub collection: String,
    pub chunks: usize,
    pub replaced: usize,
}

pub struct KnowledgeStore {
    pool: SqlitePool,
    collection: String,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl KnowledgeStore {
    /// Open (creating if needed) the store for writing.
    pub async fn create(
        db_path: &std::path::Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        let pool = db::connect(db_path, true).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, collection, embedder, batch_size))
    }

    /// Open an existing store for querying.
    pub async fn open(
        db_path: &std::path::Path,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let pool = db::connect(db_path, false).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, collection, embedder, 1))
    }

    fn with_pool(
        pool: SqlitePool,
        collection: &str,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Self {
        Self {
            pool,
            collection: collection.to_string(),
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed `chunks` and replace the collection with them.
    pub async fn index(&self, chunks: &[Chunk]) -> Result<IndexReport> {
        let dims = self.embedder.dims();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed(&texts).await?;
            check_shape(&embedded, texts.len(), dims)?;
            vectors.extend(embedded);
            debug!(done = vectors.len(), total = chunks.len(), "embedded batch");
        }

        let mut tx = self.pool.begin().await?;

        let replaced: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO collections (name, model, dims, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                model = excluded.model,
                dims = excluded.dims,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(&self.collection)
        .bind(self.embedder.model_name())
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (seq, (chunk, vector)) in chunks.iter().zip(vectors.iter()).enumerate() {
            let metadata_json = serde_json::to_string(&chunk.metadata)
                .map_err(|e| Error::StoreUnavailable(format!("cannot encode metadata: {}", e)))?;

            sqlx::query(
                r#"
                INSERT INTO records (id, collection, seq, text, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&self.collection)
            .bind(seq as i64)
            .bind(&chunk.text)
            .bind(metadata_json)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            collection = %self.collection,
            chunks = chunks.len(),
            replaced,
            "collection indexed"
        );

        Ok(IndexReport {
            collection: self.collection.clone(),
            chunks: chunks.len(),
            replaced: replaced as usize,
        })
    }

    /// The `k` stored chunks most similar to `text`, best first.
    ///
    /// Equal scores keep their original insertion order.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let stored_dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;

        let stored_dims = stored_dims.ok_or_else(|| {
            Error::StoreUnavailable(format!(
                "collection '{}' has not been indexed",
                self.collection
            ))
        })? as usize;

        if stored_dims != self.embedder.dims() {
            return Err(Error::StoreUnavailable(format!(
                "collection '{}' holds {}-dimensional vectors but {} produces {}",
                self.collection,
                stored_dims,
                self.embedder.model_name(),
                self.embedder.dims()
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingService("empty embedding response".to_string()))?;

        let rows = sqlx::query(
            "SELECT text, metadata_json, embedding FROM records WHERE collection = ? ORDER BY seq",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in &rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: ChunkMetadata = serde_json::from_str(&metadata_json)
                .map_err(|e| Error::StoreUnavailable(format!("corrupt record metadata: {}", e)))?;
            let blob: Vec<u8> = row.get("embedding");

            scored.push(ScoredChunk {
                text: row.get("text"),
                metadata,
                score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
            });
        }

        // Stable sort: ties stay in seq order
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Number of records in the collection.
    pub async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
