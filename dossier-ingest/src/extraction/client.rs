//! OpenAI-compatible chat-completions client
//!
//! Sends one streaming chat completion per request and yields the
//! `choices[0].delta.content` fragments in arrival order.
//!
//! Wire format of the response body:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"{\"na"}}]}
//!
//! data: {"choices":[{"delta":{"content":"me\": ..."}}]}
//!
//! data: [DONE]
//! ```

use async_trait::async_trait;
use dossier_common::config::ExtractionConfig;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::{ExtractionError, ExtractionRequest, ExtractionService, TokenStream};

/// Chat-completions streaming client
pub struct OpenAiCompatibleClient {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ExtractionService for OpenAiCompatibleClient {
    async fn stream(&self, request: ExtractionRequest) -> Result<TokenStream, ExtractionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ExtractionError::NotConfigured("API key not set".to_string()))?;

        let body = json!({
            "model": self.model,
            "stream": true,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": request.role.instructions() },
                { "role": "user", "content": request.content },
            ],
        });

        debug!(
            model = %self.model,
            role = ?request.role,
            content_chars = request.content.len(),
            "Opening extraction stream"
        );

        let response = self
            .http_client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut decoder = LineDecoder::default();
            'outer: while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                for line in decoder.push(&chunk) {
                    match parse_stream_line(&line)? {
                        StreamLine::Fragment(fragment) => yield fragment,
                        StreamLine::Done => break 'outer,
                        StreamLine::Skip => {}
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Splits a byte stream into complete lines
#[derive(Debug, Default)]
pub(crate) struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Append bytes and return every line completed by them (without `\n`/`\r\n`).
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamLine {
    Fragment(String),
    Done,
    Skip,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Interpret one line of the completion event stream.
pub(crate) fn parse_stream_line(line: &str) -> Result<StreamLine, ExtractionError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamLine::Skip);
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return Ok(StreamLine::Done);
    }
    if data.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let payload: ChunkPayload =
        serde_json::from_str(data).map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    match payload
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(content) if !content.is_empty() => Ok(StreamLine::Fragment(content)),
        _ => Ok(StreamLine::Skip),
    }
}
