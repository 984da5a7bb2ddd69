//! In-process collaborators

use async_trait::async_trait;
use dossier_common::profile::SourceType;
use dossier_ingest::acquire::{NetworkError, NetworkProfileProvider};
use dossier_ingest::extraction::{
    ExtractionError, ExtractionRequest, ExtractionService, TokenStream,
};
use futures::StreamExt;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Extraction service that replays queued outputs in fixed-size chunks
///
/// Every request is recorded so tests can inspect the acquired text.
pub struct FakeExtractor {
    outputs: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ExtractionRequest>>,
    chunk_chars: usize,
}

impl FakeExtractor {
    pub fn new(chunk_chars: usize) -> Self {
        Self {
            outputs: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk_chars,
        }
    }

    /// Queue the output of the next extraction call.
    pub fn push_output(&self, output: impl Into<String>) {
        self.outputs.lock().unwrap().push_back(output.into());
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionService for FakeExtractor {
    async fn stream(&self, request: ExtractionRequest) -> Result<TokenStream, ExtractionError> {
        self.requests.lock().unwrap().push(request);
        let output = self
            .outputs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExtractionError::Status {
                status: 503,
                body: "no canned output queued".to_string(),
            })?;

        let chars: Vec<char> = output.chars().collect();
        let fragments: Vec<Result<String, ExtractionError>> = chars
            .chunks(self.chunk_chars.max(1))
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        Ok(futures::stream::iter(fragments).boxed())
    }
}

/// Network provider returning a fixed payload
pub struct FakeNetwork {
    payload: Value,
    calls: Mutex<Vec<(SourceType, String)>>,
}

impl FakeNetwork {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(SourceType, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkProfileProvider for FakeNetwork {
    async fn fetch_profile(
        &self,
        source_type: SourceType,
        identifier: &str,
    ) -> Result<Value, NetworkError> {
        self.calls
            .lock()
            .unwrap()
            .push((source_type, identifier.to_string()));
        Ok(self.payload.clone())
    }
}
