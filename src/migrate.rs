use sqlx::SqlitePool;

use crate::error::Result;

/// Create the collection tables if they do not exist yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per collection, recording the model that produced its vectors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            indexed_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Embedding records; seq preserves insertion order for tie-breaking
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            seq INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL,
            embedding BLOB NOT NULL,
            UNIQUE(collection, seq),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, seq)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use sqlx::Row;

    #[tokio::test]
    async fn test_records_schema() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect(&tmp.path().join("store.sqlite"), true)
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        // Idempotent
        run_migrations(&pool).await.unwrap();

        let columns: Vec<String> = sqlx::query("PRAGMA table_info(records)")
            .fetch_all(&pool)
            .await
            .unwrap()
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();
        assert_eq!(
            columns,
            vec!["id", "collection", "seq", "text", "metadata_json", "embedding"]
        );
    }
}
