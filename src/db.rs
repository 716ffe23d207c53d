//! SQLite connection pooling.
//!
//! One pool per process, WAL journaling, at most five connections. The
//! database file and its parent directory are created on first use, so
//! `mqa init` works from an empty checkout.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::DbConfig;

/// Open (creating if needed) the index database described by `[db]`.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let db = DbConfig {
            path: tmp.path().join("nested/dir/mqa.sqlite"),
        };

        let pool = connect(&db).await.unwrap();
        sqlx::query("SELECT 1").execute(&pool).await.unwrap();
        pool.close().await;

        assert!(db.path.exists());
    }
}
