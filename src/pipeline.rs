//! Query orchestration pipeline.
//!
//! A strict forward-only DAG with no loops or retries:
//!
//! ```text
//! analyze_query ──▶ get_embedding ──▶ search_index ──▶ build_prompt ──▶ generate
//!      │                                   │
//!      ├──▶ handle_no_context ◀────────────┘ (nothing retrieved)
//!      └──▶ handle_invalid_manual
//! ```
//!
//! Every run terminates in exactly one of three outcomes: a generated
//! answer, a canned non-RAG answer, or an invalid-manual message. Routing
//! decisions are pure functions over immutable inputs ([`route_scenario`],
//! [`route_retrieval`]), so each transition is testable without any
//! external service. Local, recoverable conditions (parse failure, no
//! context, unknown manual) resolve into designed terminal states;
//! only unexpected external-service faults propagate as errors, and the
//! caller never observes partial state.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::ManualCatalog;
use crate::classify::classify;
use crate::config::Config;
use crate::models::{Classification, Scenario, SearchHit};
use crate::prompt;
use crate::traits::{Completer, Embedder, VectorIndex};
use crate::{completion, db, embedding, index};

/// Terminal outcome of one orchestration run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Answer generated from retrieved manual context.
    Generated(String),
    /// Canned non-RAG answer (greeting, general chat, nothing retrieved).
    Canned(String),
    /// Corrective message naming the unmatched manual.
    InvalidManual(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Outcome::Generated(t) | Outcome::Canned(t) | Outcome::InvalidManual(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Outcome::Generated(t) | Outcome::Canned(t) | Outcome::InvalidManual(t) => t,
        }
    }
}

/// Next stage after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Proceed to embedding and retrieval, scoped to this manual.
    Retrieve { manual: String },
    /// Short-circuit to the canned answer for this scenario.
    NoContext(Scenario),
    /// Terminate with the invalid-manual message.
    InvalidManual { name: String },
}

/// Next stage after retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalRoute {
    BuildPrompt,
    NoContext,
}

/// Route a classification to the next pipeline stage.
pub fn route_scenario(classification: &Classification) -> Route {
    match classification.scenario {
        Scenario::ManualQuery => match &classification.manual_name {
            Some(manual) => Route::Retrieve {
                manual: manual.clone(),
            },
            // Classifier contract puts a resolved name on every
            // manual_query; a missing one degrades to general chat
            None => Route::NoContext(Scenario::GeneralChat),
        },
        Scenario::InvalidManual => Route::InvalidManual {
            name: classification.manual_name.clone().unwrap_or_default(),
        },
        Scenario::Greeting => Route::NoContext(Scenario::Greeting),
        Scenario::GeneralChat => Route::NoContext(Scenario::GeneralChat),
    }
}

/// Route a retrieval result to the next pipeline stage.
pub fn route_retrieval(hits: &[SearchHit]) -> RetrievalRoute {
    if hits.is_empty() {
        RetrievalRoute::NoContext
    } else {
        RetrievalRoute::BuildPrompt
    }
}

/// Canned answer for a no-context scenario.
pub fn canned_answer(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::Greeting => prompt::GREETING_ANSWER,
        _ => prompt::GENERAL_CHAT_ANSWER,
    }
}

/// One query-orchestration engine, shared across requests.
///
/// Holds the service seams and the read-only catalog snapshot. Each call
/// to [`run`](QueryPipeline::run) threads fresh request-scoped state
/// through the DAG; nothing here is mutated by a run.
pub struct QueryPipeline {
    embedder: Arc<dyn Embedder>,
    completer: Arc<dyn Completer>,
    index: Arc<dyn VectorIndex>,
    catalog: ManualCatalog,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        completer: Arc<dyn Completer>,
        index: Arc<dyn VectorIndex>,
        catalog: ManualCatalog,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            completer,
            index,
            catalog,
            top_k,
        }
    }

    /// Build a pipeline from configuration: HTTP service clients, the
    /// SQLite index, and a catalog snapshot loaded from it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = Arc::new(embedding::HttpEmbedder::new(&config.embedding)?);
        let completer = Arc::new(completion::HttpCompleter::new(&config.completion)?);
        let pool = db::connect(&config.db).await?;
        let index: Arc<dyn VectorIndex> = Arc::new(index::SqliteIndex::new(pool));
        let catalog = ManualCatalog::load(index.as_ref()).await?;

        info!(manuals = catalog.manuals().len(), "query pipeline ready");

        Ok(Self::new(
            embedder,
            completer,
            index,
            catalog,
            config.retrieval.top_k,
        ))
    }

    pub fn catalog(&self) -> &ManualCatalog {
        &self.catalog
    }

    /// Run one query to a terminal outcome (buffered).
    pub async fn run(&self, query: &str) -> Result<Outcome> {
        let query = query.trim();
        if query.is_empty() {
            bail!("query must not be empty");
        }

        let classification = classify(self.completer.as_ref(), &self.catalog, query).await?;
        debug!(?classification, "query classified");

        match route_scenario(&classification) {
            Route::NoContext(scenario) => Ok(Outcome::Canned(canned_answer(scenario).to_string())),
            Route::InvalidManual { name } => Ok(Outcome::InvalidManual(
                prompt::invalid_manual_answer(&name, self.catalog.manuals()),
            )),
            Route::Retrieve { manual } => {
                let generation = self.prepare_generation(query, &manual).await?;
                match generation {
                    None => Ok(Outcome::Canned(prompt::NO_CONTEXT_ANSWER.to_string())),
                    Some(built) => {
                        let answer = self.completer.complete(&built).await?;
                        Ok(Outcome::Generated(answer))
                    }
                }
            }
        }
    }

    /// Run one query, delivering the answer incrementally.
    ///
    /// Canned and invalid-manual paths yield exactly one fragment; the
    /// generated path forwards the completion service's fragments in
    /// arrival order. A mid-stream service failure surfaces as one `Err`
    /// on the channel.
    pub async fn run_stream(&self, query: &str) -> Result<mpsc::Receiver<Result<String>>> {
        let query = query.trim();
        if query.is_empty() {
            bail!("query must not be empty");
        }

        let classification = classify(self.completer.as_ref(), &self.catalog, query).await?;
        debug!(?classification, "query classified");

        let fixed = match route_scenario(&classification) {
            Route::NoContext(scenario) => Some(canned_answer(scenario).to_string()),
            Route::InvalidManual { name } => {
                Some(prompt::invalid_manual_answer(&name, self.catalog.manuals()))
            }
            Route::Retrieve { manual } => match self.prepare_generation(query, &manual).await? {
                None => Some(prompt::NO_CONTEXT_ANSWER.to_string()),
                Some(built) => {
                    return self.completer.complete_stream(&built).await;
                }
            },
        };

        let (tx, rx) = mpsc::channel(1);
        if let Some(text) = fixed {
            // Single canned fragment; ignore a dropped receiver
            let _ = tx.try_send(Ok(text));
        }
        Ok(rx)
    }

    /// Shared middle of the DAG: embed, search, and build the prompt.
    ///
    /// Returns `None` when retrieval comes back empty (the no-context
    /// terminal), `Some(prompt)` otherwise.
    async fn prepare_generation(&self, query: &str, manual: &str) -> Result<Option<String>> {
        let vector = self.embedder.embed(query).await?;
        if vector.len() != self.embedder.dims() {
            bail!(
                "embedding service returned {} dimensions, expected {}",
                vector.len(),
                self.embedder.dims()
            );
        }
        let hits = self.index.search(&vector, self.top_k, Some(manual)).await?;
        debug!(manual = %manual, hits = hits.len(), "index searched");

        match route_retrieval(&hits) {
            RetrievalRoute::NoContext => Ok(None),
            RetrievalRoute::BuildPrompt => Ok(Some(prompt::build(query, &hits))),
        }
    }
}
