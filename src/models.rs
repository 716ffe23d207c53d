//! Core data models used throughout Manual QA.
//!
//! These types represent the chunks that flow through the ingestion
//! pipeline and the classification and retrieval results that flow
//! through a query run.

use serde::Deserialize;

/// One retrieval unit produced by the chunking pass.
///
/// Created once per ingested manual and immutable thereafter; persisted
/// into the vector index alongside its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Chunk content. May retain markdown heading markers.
    pub text: String,
    /// Identifier of the originating manual, derived from the storage key.
    pub source_document: String,
    /// Best-effort source page number. `0` means unknown.
    pub page: u32,
    /// Monotonically increasing within a document, assigned at creation.
    /// Used for ordering and debugging only.
    pub chunk_seq: i64,
}

/// A chunk returned from the vector index at query time.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub source_document: String,
    pub page: u32,
    /// Cosine similarity against the query vector.
    pub score: f64,
}

/// The classified intent of a user question, drawn from a closed set.
///
/// `InvalidManual` is never returned by the classifier model itself; it is
/// derived when an extracted manual name fails catalog resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    ManualQuery,
    GeneralChat,
    Greeting,
    InvalidManual,
}

/// Classifier output: a scenario plus an optional manual reference.
///
/// After catalog resolution, `manual_name` holds the resolved catalog
/// entry for `ManualQuery`, or the original unmatched name for
/// `InvalidManual` (so the user-facing message can echo it back).
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub scenario: Scenario,
    pub manual_name: Option<String>,
}

impl Classification {
    pub fn fallback() -> Self {
        Self {
            scenario: Scenario::GeneralChat,
            manual_name: None,
        }
    }
}
