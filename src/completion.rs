//! Text-completion service clients.
//!
//! [`HttpCompleter`] implements the [`Completer`] seam over the OpenAI
//! chat-completions API or a local Ollama instance. The prompt is
//! forwarded verbatim with the fixed sampling parameters from config;
//! the response text is returned unmodified. There is no retry, masking,
//! or post-processing at this layer — a service failure propagates as a
//! terminal error for the whole query run.
//!
//! The streaming variant yields fragments over a channel in arrival
//! order: OpenAI sends SSE `data:` frames, Ollama sends NDJSON lines;
//! both are decoded into plain text fragments here so the rest of the
//! pipeline never sees transport framing.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::traits::Completer;

/// HTTP-backed text-completion client.
pub struct HttpCompleter {
    config: CompletionConfig,
    client: reqwest::Client,
}

impl HttpCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        match config.provider.as_str() {
            "openai" => {
                if std::env::var("OPENAI_API_KEY").is_err() {
                    bail!("OPENAI_API_KEY environment variable not set");
                }
            }
            "ollama" => {}
            "disabled" => {
                bail!("Completion provider is disabled. Set [completion] provider in config.")
            }
            other => bail!("Unknown completion provider: {}", other),
        }
        if config.model.is_none() {
            bail!("completion.model required");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        let model = self.config.model.as_deref().unwrap_or_default();
        match self.config.provider.as_str() {
            "ollama" => serde_json::json!({
                "model": model,
                "prompt": prompt,
                "stream": stream,
                "options": {
                    "temperature": self.config.temperature,
                    "top_p": self.config.top_p,
                    "num_predict": self.config.max_tokens,
                },
            }),
            _ => serde_json::json!({
                "model": model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "max_tokens": self.config.max_tokens,
                "stream": stream,
            }),
        }
    }

    fn endpoint(&self) -> String {
        match self.config.provider.as_str() {
            "ollama" => {
                let url = self.config.url.as_deref().unwrap_or("http://localhost:11434");
                format!("{}/api/generate", url)
            }
            _ => {
                let url = self
                    .config
                    .url
                    .as_deref()
                    .unwrap_or("https://api.openai.com");
                format!("{}/v1/chat/completions", url)
            }
        }
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, stream));

        if self.config.provider == "openai" {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("OPENAI_API_KEY not set"))?;
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Completion API error {}: {}", status, body_text);
        }
        Ok(response)
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let response = self.send(prompt, false).await?;
        let json: serde_json::Value = response.json().await?;

        match self.config.provider.as_str() {
            "ollama" => json
                .get("response")
                .and_then(|r| r.as_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Invalid Ollama response: missing response field")),
            _ => json
                .pointer("/choices/0/message/content")
                .and_then(|c| c.as_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Invalid completion response: missing message content")),
        }
    }

    async fn complete_stream(&self, prompt: &str) -> Result<mpsc::Receiver<Result<String>>> {
        let response = self.send(prompt, true).await?;
        let provider = self.config.provider.clone();
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf = String::new();

            while let Some(next) = stream.next().await {
                let bytes = match next {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(anyhow!("completion stream failed: {}", e))).await;
                        return;
                    }
                };

                buf.push_str(&String::from_utf8_lossy(&bytes));

                // Both transports are newline-delimited; process complete
                // lines and keep the trailing partial in the buffer.
                while let Some(pos) = buf.find('\n') {
                    let line = buf[..pos].trim().to_string();
                    buf.drain(..=pos);

                    if line.is_empty() {
                        continue;
                    }

                    match decode_stream_line(&provider, &line) {
                        StreamEvent::Fragment(text) => {
                            if !text.is_empty() && tx.send(Ok(text)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        StreamEvent::Done => return,
                        StreamEvent::Skip => {}
                    }
                }
            }
        });

        Ok(rx)
    }
}

enum StreamEvent {
    Fragment(String),
    Done,
    Skip,
}

/// Decode one transport line into a text fragment.
fn decode_stream_line(provider: &str, line: &str) -> StreamEvent {
    match provider {
        "ollama" => {
            // NDJSON: {"response": "...", "done": false}
            let Ok(json) = serde_json::from_str::<serde_json::Value>(line) else {
                debug!(line = %line, "skipping undecodable stream line");
                return StreamEvent::Skip;
            };
            if json.get("done").and_then(|d| d.as_bool()) == Some(true) {
                return StreamEvent::Done;
            }
            match json.get("response").and_then(|r| r.as_str()) {
                Some(text) => StreamEvent::Fragment(text.to_string()),
                None => StreamEvent::Skip,
            }
        }
        _ => {
            // SSE: data: {"choices":[{"delta":{"content":"..."}}]}
            let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
                return StreamEvent::Skip;
            };
            if payload == "[DONE]" {
                return StreamEvent::Done;
            }
            let Ok(json) = serde_json::from_str::<serde_json::Value>(payload) else {
                debug!(line = %line, "skipping undecodable stream line");
                return StreamEvent::Skip;
            };
            match json
                .pointer("/choices/0/delta/content")
                .and_then(|c| c.as_str())
            {
                Some(text) => StreamEvent::Fragment(text.to_string()),
                None => StreamEvent::Skip,
            }
        }
    }
}
