//! Semantic extraction
//!
//! The extraction collaborator turns unstructured text (or a merge request)
//! into a stream of text fragments whose concatenation is a JSON profile
//! document. The pipeline relays each fragment as it arrives.

pub mod client;
pub mod prompts;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use client::OpenAiCompatibleClient;
pub use prompts::InstructionRole;

/// Ordered fragments of the extraction output
pub type TokenStream = BoxStream<'static, Result<String, ExtractionError>>;

/// Extraction collaborator errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Service is not configured (e.g. missing API key)
    #[error("extraction service not configured: {0}")]
    NotConfigured(String),

    /// Transport failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Stream chunk could not be decoded
    #[error("malformed stream chunk: {0}")]
    Malformed(String),
}

/// One extraction request
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub role: InstructionRole,
    /// Acquired text, or the serialized merge input
    pub content: String,
}

impl ExtractionRequest {
    pub fn new(role: InstructionRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// External semantic-extraction service
#[async_trait]
pub trait ExtractionService: Send + Sync {
    /// Open a fragment stream for `request`.
    ///
    /// An `Err` here means the service refused the request before any
    /// fragment was produced.
    async fn stream(&self, request: ExtractionRequest) -> Result<TokenStream, ExtractionError>;
}
