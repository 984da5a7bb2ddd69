//! Raw input acquisition
//!
//! Turns a request into the text handed to the extraction service plus an
//! opaque snapshot of what was acquired (stored as `raw_content`).

pub mod document;
pub mod network;

use dossier_common::profile::SourceType;
use serde_json::Value;

pub use document::{
    DocumentDecoder, DocumentDecoders, DocumentError, PdfiumDecoder, PlainTextDecoder,
    PAGE_SEPARATOR,
};
pub use network::{HttpNetworkProvider, NetworkError, NetworkProfileProvider};

/// Result of a successful acquisition
#[derive(Debug, Clone)]
pub struct AcquiredInput {
    /// Filename or URL recorded on the knowledge source
    pub source_identifier: String,
    /// Opaque snapshot of the acquired content
    pub raw_content: Value,
    /// Text sent to the extraction service
    pub text: String,
}

/// Uploaded (or submitted) document
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Client correlation id
    pub source_id: String,
    pub source_type: SourceType,
    pub filename: Option<String>,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    /// Identifier recorded on the stored source
    pub fn identifier(&self) -> String {
        self.filename
            .clone()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| self.source_id.clone())
    }
}

/// Remote profile fetch request
#[derive(Debug, Clone)]
pub struct NetworkRequest {
    /// Client correlation id
    pub source_id: String,
    pub source_type: SourceType,
    pub url: String,
}
