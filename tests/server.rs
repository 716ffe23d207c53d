//! Status-code contract for the HTTP query endpoints.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use manual_qa::catalog::ManualCatalog;
use manual_qa::index::MemoryIndex;
use manual_qa::pipeline::QueryPipeline;
use manual_qa::prompt;
use manual_qa::server::run_server_with_pipeline;
use manual_qa::traits::{Completer, Embedder};

struct GreetingCompleter;

#[async_trait]
impl Completer for GreetingCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(r#"{"scenario": "greeting"}"#.to_string())
    }

    async fn complete_stream(&self, _prompt: &str) -> Result<mpsc::Receiver<Result<String>>> {
        bail!("not used")
    }
}

struct FailingCompleter;

#[async_trait]
impl Completer for FailingCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("completion service unavailable")
    }

    async fn complete_stream(&self, _prompt: &str) -> Result<mpsc::Receiver<Result<String>>> {
        bail!("completion service unavailable")
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    fn dims(&self) -> usize {
        2
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(base: &str) {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn spawn_server(completer: Arc<dyn Completer>) -> String {
    let bind = format!("127.0.0.1:{}", find_free_port());
    let catalog = ManualCatalog::new(vec!["Bobcat-T590".to_string()]);
    let pipeline = Arc::new(QueryPipeline::new(
        Arc::new(FixedEmbedder),
        completer,
        Arc::new(MemoryIndex::new()),
        catalog,
        3,
    ));

    let addr = bind.clone();
    tokio::spawn(async move {
        run_server_with_pipeline(&addr, pipeline).await.unwrap();
    });

    let base = format!("http://{}", bind);
    wait_for_server(&base).await;
    base
}

#[tokio::test]
async fn test_missing_query_field_is_400() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", base))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_blank_query_is_400() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", base))
        .json(&serde_json::json!({ "query": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "query must not be empty");
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", base))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_valid_query_is_200_with_answer() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", base))
        .json(&serde_json::json!({ "query": "안녕하세요" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["text"], prompt::GREETING_ANSWER);
}

#[tokio::test]
async fn test_pipeline_failure_is_500_with_generic_body() {
    let base = spawn_server(Arc::new(FailingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query", base))
        .json(&serde_json::json!({ "query": "T590 사양은?" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = resp.json().await.unwrap();
    // Generic message only; the cause stays in the server log
    assert_eq!(body["error"], "internal error");
}

#[tokio::test]
async fn test_stream_missing_query_field_is_400() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query/stream", base))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stream_canned_answer_is_single_sse_frame() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/query/stream", base))
        .json(&serde_json::json!({ "query": "안녕" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body = resp.text().await.unwrap();
    let frames: Vec<&str> = body
        .lines()
        .filter(|l| l.starts_with("data:"))
        .collect();
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("text"));
}

#[tokio::test]
async fn test_health_reports_ok() {
    let base = spawn_server(Arc::new(GreetingCompleter)).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/health", base)).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
