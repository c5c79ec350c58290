use std::time::Duration;

use anyhow::{Error, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model")]
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Part {
    pub text: String,
}

/// One turn of a conversation in the Gemini wire shape. The same
/// shape is used for request contents, response candidates, and
/// persisted history so records written by older plugin versions
/// remain readable.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Content {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, text: &str) -> Self {
        Content {
            role,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    /// All parts concatenated into a single string.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<String>()
    }
}

/// Free-form generation parameters (temperature, topK, ...). The
/// core never interprets these, it only forwards and persists them,
/// so they stay an opaque order-preserving JSON object.
pub type GenerationConfig = Map<String, Value>;

/// Free-form safety filter settings, forwarded verbatim as an ordered
/// list of records.
pub type SafetySettings = Vec<Value>;

fn request_payload(
    contents: &[Content],
    generation_config: &Option<GenerationConfig>,
    safety_settings: &Option<SafetySettings>,
) -> Value {
    let mut payload = json!({
        "contents": contents,
    });
    if let Some(config) = generation_config {
        payload["generationConfig"] = Value::Object(config.clone());
    }
    if let Some(settings) = safety_settings {
        payload["safetySettings"] = json!(settings);
    }
    payload
}

/// One-shot, non-streaming generation. Returns the raw response body
/// so callers can pull out whatever they need (see [`response_text`]).
pub async fn generate_content(
    contents: &[Content],
    generation_config: &Option<GenerationConfig>,
    safety_settings: &Option<SafetySettings>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        api_hostname.trim_end_matches("/"),
        model
    );
    let response = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&request_payload(contents, generation_config, safety_settings))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response)
}

/// Extracts the concatenated text of the first candidate. `None` when
/// the response has no usable text (blocked, empty, or malformed).
pub fn response_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text = parts
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<String>();
    if text.is_empty() { None } else { Some(text) }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkCandidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentChunk {
    candidates: Option<Vec<ChunkCandidate>>,
}

/// Streaming generation over SSE. Each text fragment is forwarded on
/// `tx` in arrival order and the full concatenation is returned once
/// the remote stream ends. The stream is not restartable; every call
/// opens a fresh request.
pub async fn stream_generate_content(
    tx: mpsc::UnboundedSender<String>,
    contents: &[Content],
    generation_config: &Option<GenerationConfig>,
    safety_settings: &Option<SafetySettings>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<String, Error> {
    let url = format!(
        "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
        api_hostname.trim_end_matches("/"),
        model
    );
    let response = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&request_payload(contents, generation_config, safety_settings))
        .send()
        .await?
        .error_for_status()?;

    let mut stream = response.bytes_stream();

    let mut content_buf = String::new();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk_str = std::str::from_utf8(&chunk)?;

        // Append new data to buffer. This is necessary to handle SSE
        // fragmentation over HTTP/2 frames.
        buffer.push_str(chunk_str);

        // Process all complete SSE events from the buffer
        while let Some(event_end) = buffer.find("\n\n") {
            let event_data = buffer[..event_end].to_string();
            buffer = buffer[event_end + 2..].to_string();

            let event_data = event_data.trim();
            if event_data.is_empty() {
                continue;
            }

            // Parse SSE events
            if !event_data.starts_with("data: ") {
                continue;
            }

            let data = event_data[6..].trim();
            if data.is_empty() {
                continue;
            }

            let chunk = serde_json::from_str::<GenerateContentChunk>(data).inspect_err(|e| {
                tracing::error!("Parsing generation chunk failed for {}\nError:{}", data, e)
            })?;

            let Some(candidate) = chunk.candidates.as_ref().and_then(|c| c.first()) else {
                continue;
            };

            if let Some(content) = &candidate.content {
                let text = content.text();
                if !text.is_empty() {
                    // The result is ignored here because the receiver
                    // hanging up should not stop response assembly
                    let _ = tx.send(text.clone());
                    content_buf += &text;
                }
            }

            if let Some(reason) = &candidate.finish_reason {
                if reason != "STOP" {
                    tracing::warn!("Generation finished early: {}", reason);
                }
            }
        }
    }

    Ok(content_buf)
}
