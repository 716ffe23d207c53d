//! Service seams for the external collaborators.
//!
//! The query pipeline never talks to HTTP services or the database
//! directly; it goes through these traits so that every branch of the
//! orchestration graph can be exercised against fakes and the in-memory
//! index. All operations are async (via `async-trait`) and implementations
//! must be `Send + Sync`.
//!
//! | Trait | Concern | Reference implementation |
//! |-------|---------|--------------------------|
//! | [`Embedder`] | text → fixed-length vector | [`crate::embedding::HttpEmbedder`] |
//! | [`Completer`] | prompt → generated text (buffered or streamed) | [`crate::completion::HttpCompleter`] |
//! | [`VectorIndex`] | k-NN storage and search | [`crate::index::SqliteIndex`], [`crate::index::MemoryIndex`] |

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::{ChunkRecord, SearchHit};

/// Embedding service: turns text into a fixed-dimensionality vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector dimensionality (1536 in the reference deployment).
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Text-completion service.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete a prompt and return the full response text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete a prompt incrementally.
    ///
    /// The receiver yields `Ok(fragment)` values in arrival order until the
    /// stream closes. A mid-stream service failure surfaces as exactly one
    /// `Err`, after which no further fragments arrive.
    async fn complete_stream(&self, prompt: &str) -> Result<mpsc::Receiver<Result<String>>>;
}

/// Vector index over chunk records.
///
/// `search` is a black-box k-nearest-neighbor query; the optional
/// source-document filter is structural and must be applied before the
/// top-k cut, never after.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Store one chunk record with its embedding vector.
    async fn index_chunk(&self, record: &ChunkRecord, vector: &[f32]) -> Result<()>;

    /// Remove all chunks for a source document (used on re-ingestion).
    async fn delete_document(&self, source_document: &str) -> Result<()>;

    /// Return the top-`k` chunks most similar to `vector`, optionally
    /// constrained to one source document. An empty result is a valid,
    /// non-error outcome.
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>>;

    /// List the distinct source documents known to the index.
    async fn list_documents(&self) -> Result<Vec<String>>;
}
