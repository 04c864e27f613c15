//! Streaming generation adapter.
//!
//! Drives a text-generation backend in streaming mode and re-emits its
//! output as [`GenerationEvent`]s on a bounded channel. A producer task
//! owns the backend call; the transport layer consumes the receiver. This
//! decouples backend-call lifetime from client disconnects: when the
//! receiver is dropped, the next send fails and the producer stops,
//! tearing the backend session down.
//!
//! Failure policy: whatever fragments were already delivered stand as-is.
//! On any pre-stream or mid-stream backend failure, exactly one terminal
//! [`GenerationEvent::Error`] is emitted and the stream ends. No retry,
//! no resume.

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::Config;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Bounded capacity of the event channel between producer and transport.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// One unit of incrementally streamed model output.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// One backend content fragment, newlines escaped to the literal
    /// two-character `\n` sentinel so newline-delimited framing is never
    /// corrupted by payload content.
    Content(String),
    /// Terminal failure with a human-readable message. Always the last
    /// event of its stream.
    Error(String),
}

/// Capability interface for streaming text generation.
///
/// Implementations push content fragments onto `tx` in emission order and
/// return `Err` on backend failure; the error is turned into the terminal
/// [`GenerationEvent::Error`] by [`stream_events`]. A failed send means
/// the consumer is gone — implementations should stop and return `Ok`.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;

    /// Open a fresh backend session for `prompt` and stream fragments.
    async fn generate(&self, prompt: &str, tx: mpsc::Sender<GenerationEvent>) -> Result<()>;
}

/// Start a producer task for `prompt` and hand back the event receiver.
///
/// Each call opens a new backend session; streams are not restartable.
pub fn stream_events(
    generator: Arc<dyn Generator>,
    prompt: String,
) -> mpsc::Receiver<GenerationEvent> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        if let Err(e) = generator.generate(&prompt, tx.clone()).await {
            eprintln!("generation failed: {:#}", e);
            let _ = tx.send(GenerationEvent::Error(format!("{:#}", e))).await;
        }
    });
    rx
}

/// Escape a content fragment for newline-delimited event framing.
/// Carriage returns are dropped; they have no place in the payload and
/// would corrupt framing just like bare newlines.
pub fn escape_fragment(text: &str) -> String {
    text.replace('\r', "").replace('\n', "\\n")
}

/// Generation backend over the Google Generative Language streaming API.
///
/// Calls `POST /models/{model}:streamGenerateContent?alt=sse` and parses
/// the SSE `data:` frames from the response byte stream. Only a connect
/// timeout is applied; a whole-request timeout would cut off long answers.
pub struct GeminiGenerator {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.backend.resolve_api_key()?;

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.generation.connect_timeout_secs));
        if let Some(proxy) = &config.backend.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            model: config.generation.model.clone(),
            api_key,
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, tx: mpsc::Sender<GenerationEvent>) -> Result<()> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            GEMINI_API_BASE, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("generation API error {}: {}", status, body_text);
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                if line.len() <= 1 {
                    continue;
                }
                let line_str = String::from_utf8_lossy(&line[..line.len() - 1]);

                let Some(data) = line_str.trim().strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }

                if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                    let text = extract_fragment(&json);
                    if !text.is_empty()
                        && tx
                            .send(GenerationEvent::Content(escape_fragment(&text)))
                            .await
                            .is_err()
                    {
                        // Consumer disconnected; abandon the backend session.
                        return Ok(());
                    }
                }
            }
        }

        Ok(())
    }
}

/// Pull the content text out of one streamed response frame:
/// `candidates[0].content.parts[].text`, concatenated.
fn extract_fragment(json: &serde_json::Value) -> String {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    let mut out = String::new();
    if let Some(parts) = parts {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                out.push_str(text);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits a scripted fragment sequence, then optionally fails.
    struct ScriptedGenerator {
        fragments: Vec<&'static str>,
        fail_after: bool,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted-test"
        }

        async fn generate(&self, _prompt: &str, tx: mpsc::Sender<GenerationEvent>) -> Result<()> {
            for f in &self.fragments {
                if tx
                    .send(GenerationEvent::Content(escape_fragment(f)))
                    .await
                    .is_err()
                {
                    return Ok(());
                }
            }
            if self.fail_after {
                bail!("quota exceeded")
            }
            Ok(())
        }
    }

    async fn collect(mut rx: mpsc::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        events
    }

    #[test]
    fn escape_replaces_newlines_with_sentinel() {
        assert_eq!(escape_fragment("a\nb\nc"), "a\\nb\\nc");
        assert_eq!(escape_fragment("no newline"), "no newline");
    }

    #[tokio::test]
    async fn clean_completion_ends_stream_without_error() {
        let rx = stream_events(
            Arc::new(ScriptedGenerator {
                fragments: vec!["Hello, ", "world"],
                fail_after: false,
            }),
            "p".to_string(),
        );
        let events = collect(rx).await;
        assert_eq!(
            events,
            vec![
                GenerationEvent::Content("Hello, ".to_string()),
                GenerationEvent::Content("world".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn midstream_failure_yields_exactly_one_terminal_error() {
        let rx = stream_events(
            Arc::new(ScriptedGenerator {
                fragments: vec!["one", "two"],
                fail_after: true,
            }),
            "p".to_string(),
        );
        let events = collect(rx).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], GenerationEvent::Content("one".to_string()));
        assert_eq!(events[1], GenerationEvent::Content("two".to_string()));
        match &events[2] {
            GenerationEvent::Error(msg) => assert!(msg.contains("quota exceeded")),
            other => panic!("expected terminal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn prestream_failure_yields_only_an_error() {
        let rx = stream_events(
            Arc::new(ScriptedGenerator {
                fragments: vec![],
                fail_after: true,
            }),
            "p".to_string(),
        );
        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], GenerationEvent::Error(_)));
    }

    #[test]
    fn extract_fragment_reads_candidate_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hel" }, { "text": "lo" }] }
            }]
        });
        assert_eq!(extract_fragment(&json), "Hello");
    }

    #[test]
    fn extract_fragment_tolerates_missing_fields() {
        assert_eq!(extract_fragment(&serde_json::json!({})), "");
        assert_eq!(
            extract_fragment(&serde_json::json!({ "candidates": [] })),
            ""
        );
    }
}
