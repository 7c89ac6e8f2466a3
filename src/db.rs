use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Open the store file, creating it (and its directory) when `create` is set.
///
/// Without `create`, a missing file is [`Error::StoreUnavailable`]: queries
/// must not conjure an empty collection out of a typo'd path.
pub async fn connect(db_path: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
    } else if !db_path.is_file() {
        return Err(Error::StoreUnavailable(format!(
            "no vector store at {} (run `mailrag index` first)",
            db_path.display()
        )));
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(create)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
