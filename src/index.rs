//! Vector index backends.
//!
//! [`SqliteIndex`] is the reference backend: chunk rows plus embedding
//! BLOBs in SQLite, cosine similarity computed in Rust. [`MemoryIndex`]
//! backs tests and small deployments with the same [`VectorIndex`]
//! contract.
//!
//! Both apply the source-document filter structurally before the top-k
//! cut: a filtered search over a small manual must never lose hits to
//! higher-scoring chunks from other manuals.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Mutex;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkRecord, SearchHit};
use crate::traits::VectorIndex;

/// SQLite-backed vector index.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn index_chunk(&self, record: &ChunkRecord, vector: &[f32]) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let hash = hash_text(&record.text);
        let now = chrono::Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO chunks (id, source_document, chunk_seq, page, text, hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_document, chunk_seq) DO UPDATE SET
                page = excluded.page,
                text = excluded.text,
                hash = excluded.hash,
                created_at = excluded.created_at
            "#,
        )
        .bind(&id)
        .bind(&record.source_document)
        .bind(record.chunk_seq)
        .bind(record.page as i64)
        .bind(&record.text)
        .bind(&hash)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // The upsert above may have kept an existing row id
        let chunk_id: String =
            sqlx::query_scalar("SELECT id FROM chunks WHERE source_document = ? AND chunk_seq = ?")
                .bind(&record.source_document)
                .bind(record.chunk_seq)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (chunk_id, source_document, embedding)
            VALUES (?, ?, ?)
            ON CONFLICT(chunk_id) DO UPDATE SET
                source_document = excluded.source_document,
                embedding = excluded.embedding
            "#,
        )
        .bind(&chunk_id)
        .bind(&record.source_document)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, source_document: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE source_document = ?")
            .bind(source_document)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE source_document = ?")
            .bind(source_document)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        // Structural filter in the query itself, before any scoring
        let rows = match source_filter {
            Some(source) => {
                sqlx::query(
                    r#"
                    SELECT c.text, c.source_document, c.page, cv.embedding
                    FROM chunk_vectors cv
                    JOIN chunks c ON c.id = cv.chunk_id
                    WHERE cv.source_document = ?
                    "#,
                )
                .bind(source)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT c.text, c.source_document, c.page, cv.embedding
                    FROM chunk_vectors cv
                    JOIN chunks c ON c.id = cv.chunk_id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let page: i64 = row.get("page");
                SearchHit {
                    text: row.get("text"),
                    source_document: row.get("source_document"),
                    page: page.max(0) as u32,
                    score: cosine_similarity(vector, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let docs: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT source_document FROM chunks ORDER BY source_document",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(docs)
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// In-memory vector index with the same contract as [`SqliteIndex`].
#[derive(Default)]
pub struct MemoryIndex {
    entries: Mutex<Vec<(ChunkRecord, Vec<f32>)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn index_chunk(&self, record: &ChunkRecord, vector: &[f32]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory index poisoned"))?;
        entries.retain(|(r, _)| {
            !(r.source_document == record.source_document && r.chunk_seq == record.chunk_seq)
        });
        entries.push((record.clone(), vector.to_vec()));
        Ok(())
    }

    async fn delete_document(&self, source_document: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory index poisoned"))?;
        entries.retain(|(r, _)| r.source_document != source_document);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory index poisoned"))?;

        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter(|(r, _)| source_filter.is_none_or(|s| r.source_document == s))
            .map(|(r, v)| SearchHit {
                text: r.text.clone(),
                source_document: r.source_document.clone(),
                page: r.page,
                score: cosine_similarity(vector, v) as f64,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn list_documents(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory index poisoned"))?;
        let mut docs: Vec<String> = entries
            .iter()
            .map(|(r, _)| r.source_document.clone())
            .collect();
        docs.sort();
        docs.dedup();
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, seq: i64, page: u32, text: &str) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            source_document: source.to_string(),
            page,
            chunk_seq: seq,
        }
    }

    #[tokio::test]
    async fn test_memory_index_filter_applied_before_top_k() {
        let index = MemoryIndex::new();
        // Three high-scoring chunks in another manual, one weak match in ours
        index
            .index_chunk(&record("other", 0, 1, "a"), &[1.0, 0.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("other", 1, 2, "b"), &[1.0, 0.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("other", 2, 3, "c"), &[1.0, 0.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("mine", 0, 7, "d"), &[0.2, 1.0])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 3, Some("mine")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_document, "mine");
        assert_eq!(hits[0].page, 7);
    }

    #[tokio::test]
    async fn test_memory_index_top_k_ordering() {
        let index = MemoryIndex::new();
        index
            .index_chunk(&record("m", 0, 1, "far"), &[0.0, 1.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("m", 1, 2, "near"), &[1.0, 0.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("m", 2, 3, "mid"), &[1.0, 1.0])
            .await
            .unwrap();

        let hits = index.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "near");
        assert_eq!(hits[1].text, "mid");
    }

    #[tokio::test]
    async fn test_memory_index_empty_result_is_ok() {
        let index = MemoryIndex::new();
        let hits = index.search(&[1.0], 3, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_memory_index_reingestion_replaces() {
        let index = MemoryIndex::new();
        index
            .index_chunk(&record("m", 0, 1, "old"), &[1.0])
            .await
            .unwrap();
        index.delete_document("m").await.unwrap();
        index
            .index_chunk(&record("m", 0, 1, "new"), &[1.0])
            .await
            .unwrap();

        let hits = index.search(&[1.0], 3, Some("m")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");
    }

    #[tokio::test]
    async fn test_memory_index_list_documents_sorted_distinct() {
        let index = MemoryIndex::new();
        index
            .index_chunk(&record("beta", 0, 1, "x"), &[1.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("alpha", 0, 1, "y"), &[1.0])
            .await
            .unwrap();
        index
            .index_chunk(&record("alpha", 1, 2, "z"), &[1.0])
            .await
            .unwrap();

        assert_eq!(index.list_documents().await.unwrap(), vec!["alpha", "beta"]);
    }
}
