//! HTTP query API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Answer a question (buffered) |
//! | `POST` | `/query/stream` | Answer a question (SSE fragments) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error contract
//!
//! Buffered errors are JSON: `{ "error": "query must not be empty" }` with
//! status 400 for request validation and 500 for pipeline faults. The 500
//! body stays generic; the underlying cause goes to the log.
//!
//! Streaming responses are SSE frames of the form `data: {"text":"..."}`.
//! A failure before or during generation is reported in-band as a single
//! `data: {"error":"..."}` frame, since the 200 status has already been
//! committed once streaming starts.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::config::Config;
use crate::pipeline::QueryPipeline;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<QueryPipeline>,
}

/// Starts the query API server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(QueryPipeline::from_config(config).await?);
    run_server_with_pipeline(&config.server.bind, pipeline).await
}

/// Like [`run_server`], but with a pre-built pipeline. Lets callers wire
/// in alternative service backends.
pub async fn run_server_with_pipeline(
    bind_addr: &str,
    pipeline: Arc<QueryPipeline>,
) -> anyhow::Result<()> {
    let state = AppState { pipeline };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/query", post(handle_query))
        .route("/query/stream", post(handle_query_stream))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Query server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// 500 with a generic body; the cause is logged, not leaked.
fn internal_error(err: anyhow::Error) -> AppError {
    error!(error = %err, "query pipeline failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "internal error".to_string(),
    }
}

// ============ POST /query ============

/// JSON request body for both query endpoints.
#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

/// Fold extractor rejections (malformed JSON, missing `query` field)
/// and blank queries into the single 400 contract. Without this the
/// extractor itself answers a missing field with 422.
fn parse_request(
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<QueryRequest, AppError> {
    let Json(request) = body.map_err(|rejection| bad_request(rejection.body_text()))?;
    if request.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(request)
}

/// JSON response body for `POST /query`.
#[derive(Serialize)]
struct QueryResponse {
    text: String,
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let request = parse_request(body)?;

    let outcome = state
        .pipeline
        .run(&request.query)
        .await
        .map_err(internal_error)?;

    Ok(Json(QueryResponse {
        text: outcome.into_text(),
    }))
}

// ============ POST /query/stream ============

async fn handle_query_stream(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let request = match parse_request(body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    let events = match state.pipeline.run_stream(&request.query).await {
        Ok(rx) => fragment_events(rx).boxed(),
        Err(err) => {
            // Report in-band; the client reads SSE either way
            error!(error = %err, "query pipeline failed before streaming");
            stream::once(async { Ok(error_event()) }).boxed()
        }
    };

    Sse::new(events).into_response()
}

/// Map pipeline fragments onto SSE `data: {"text":...}` frames; a
/// mid-stream failure becomes one `data: {"error":...}` frame and the
/// stream ends.
fn fragment_events(
    rx: mpsc::Receiver<anyhow::Result<String>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let event = match rx.recv().await? {
            Ok(text) => text_event(&text),
            Err(err) => {
                error!(error = %err, "query pipeline failed mid-stream");
                error_event()
            }
        };
        Some((Ok(event), rx))
    })
}

fn text_event(text: &str) -> Event {
    Event::default().data(serde_json::json!({ "text": text }).to_string())
}

fn error_event() -> Event {
    Event::default().data(serde_json::json!({ "error": "internal error" }).to_string())
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
