//! Paginated document decoding
//!
//! Decoders run on the blocking pool and hand pages over one at a time, so
//! page decoding interleaves with progress reporting on the event stream.

use pdfium_render::prelude::{Pdfium, PdfiumError};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{AcquiredInput, DocumentUpload};
use crate::error::PipelineError;
use crate::pipeline::PipelineSession;

/// Separator placed between page texts
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Progress is reported every this many pages (and on the last page)
const REPORT_EVERY_PAGES: usize = 5;

/// Decoding failures
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document format")]
    Unsupported,

    #[error("failed to load Pdfium runtime: {0}")]
    Library(#[source] PdfiumError),

    #[error("failed to load PDF document: {0}")]
    Document(#[source] PdfiumError),

    #[error("failed to extract text for page {page_index}: {source}")]
    PageText {
        page_index: usize,
        #[source]
        source: PdfiumError,
    },

    #[error("document is not valid UTF-8 text")]
    NotText,

    #[error("document contains no pages")]
    NoPages,

    #[error("no text could be extracted from the document")]
    NoText,

    #[error("decoder task failed: {0}")]
    Task(String),
}

/// One decoded page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPage {
    /// Zero-based page index
    pub index: usize,
    pub total: usize,
    pub text: String,
}

impl DecodedPage {
    fn pages_done(&self) -> usize {
        self.index + 1
    }

    /// Periodic progress point
    pub fn is_report_point(&self) -> bool {
        let done = self.pages_done();
        done % REPORT_EVERY_PAGES == 0 || done == self.total
    }
}

/// Paginated document format
pub trait DocumentDecoder: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Whether this decoder handles the upload.
    fn accepts(&self, media_type: Option<&str>, filename: Option<&str>, bytes: &[u8]) -> bool;

    /// Decode pages in order, handing each to `on_page`.
    ///
    /// Stops early when `on_page` returns `false`. Returns the page count.
    fn decode(
        &self,
        bytes: &[u8],
        on_page: &mut dyn FnMut(DecodedPage) -> bool,
    ) -> Result<usize, DocumentError>;
}

/// PDF pages via Pdfium
#[derive(Debug, Clone, Default)]
pub struct PdfiumDecoder {
    library_path: Option<PathBuf>,
}

impl PdfiumDecoder {
    /// Bind to the Pdfium library at `path` (file or directory) instead of
    /// the process-wide search.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    fn load_pdfium(&self) -> Result<Pdfium, PdfiumError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIBRARY_PATH").map(PathBuf::from));

        if let Some(path) = explicit {
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            return Pdfium::bind_to_library(lib).map(Pdfium::new);
        }

        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")) {
            Ok(bindings) => Ok(Pdfium::new(bindings)),
            Err(primary_err) => match Pdfium::bind_to_system_library() {
                Ok(bindings) => Ok(Pdfium::new(bindings)),
                Err(_) => Err(primary_err),
            },
        }
    }
}

impl DocumentDecoder for PdfiumDecoder {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn accepts(&self, media_type: Option<&str>, filename: Option<&str>, bytes: &[u8]) -> bool {
        bytes.starts_with(b"%PDF")
            || media_type.is_some_and(|m| m.eq_ignore_ascii_case("application/pdf"))
            || filename.is_some_and(|f| f.to_lowercase().ends_with(".pdf"))
    }

    fn decode(
        &self,
        bytes: &[u8],
        on_page: &mut dyn FnMut(DecodedPage) -> bool,
    ) -> Result<usize, DocumentError> {
        let pdfium = self.load_pdfium().map_err(DocumentError::Library)?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(DocumentError::Document)?;

        let pages = document.pages();
        let total = pages.len() as usize;
        for (index, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|source| DocumentError::PageText {
                    page_index: index,
                    source,
                })?
                .all();
            if !on_page(DecodedPage { index, total, text }) {
                break;
            }
        }
        Ok(total)
    }
}

/// UTF-8 text; form feeds (`\x0c`) separate pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextDecoder;

impl DocumentDecoder for PlainTextDecoder {
    fn name(&self) -> &'static str {
        "text"
    }

    fn accepts(&self, _media_type: Option<&str>, _filename: Option<&str>, bytes: &[u8]) -> bool {
        std::str::from_utf8(bytes).is_ok()
    }

    fn decode(
        &self,
        bytes: &[u8],
        on_page: &mut dyn FnMut(DecodedPage) -> bool,
    ) -> Result<usize, DocumentError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DocumentError::NotText)?;
        let pages: Vec<&str> = text.split('\x0c').collect();
        let total = pages.len();
        for (index, page) in pages.into_iter().enumerate() {
            if !on_page(DecodedPage {
                index,
                total,
                text: page.to_string(),
            }) {
                break;
            }
        }
        Ok(total)
    }
}

/// Ordered decoder list; the first that accepts an upload decodes it
#[derive(Clone)]
pub struct DocumentDecoders {
    decoders: Vec<Arc<dyn DocumentDecoder>>,
}

impl DocumentDecoders {
    pub fn new(decoders: Vec<Arc<dyn DocumentDecoder>>) -> Self {
        Self { decoders }
    }

    /// Plain text only (submitted text never goes through the PDF decoder)
    pub fn text_only() -> Self {
        Self::new(vec![Arc::new(PlainTextDecoder)])
    }

    pub fn select(&self, upload: &DocumentUpload) -> Result<Arc<dyn DocumentDecoder>, DocumentError> {
        self.decoders
            .iter()
            .find(|d| {
                d.accepts(
                    upload.media_type.as_deref(),
                    upload.filename.as_deref(),
                    &upload.bytes,
                )
            })
            .cloned()
            .ok_or(DocumentError::Unsupported)
    }
}

impl Default for DocumentDecoders {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(PdfiumDecoder::default()),
            Arc::new(PlainTextDecoder),
        ])
    }
}

/// Joins every page text in page order with [`PAGE_SEPARATOR`]
#[derive(Debug, Default)]
struct PageAssembler {
    text: String,
    pages: usize,
}

impl PageAssembler {
    fn push(&mut self, page: &str) {
        if self.pages > 0 {
            self.text.push_str(PAGE_SEPARATOR);
        }
        self.text.push_str(page);
        self.pages += 1;
    }
}

fn acquisition(err: DocumentError) -> PipelineError {
    PipelineError::Acquisition(err.to_string())
}

/// Decode an upload, reporting page progress on the session.
pub async fn acquire_document(
    decoders: &DocumentDecoders,
    upload: DocumentUpload,
    session: &mut PipelineSession,
) -> Result<AcquiredInput, PipelineError> {
    let decoder = decoders.select(&upload).map_err(acquisition)?;
    let identifier = upload.identifier();
    let byte_len = upload.bytes.len();

    debug!(
        session_id = %session.id(),
        decoder = decoder.name(),
        bytes = byte_len,
        "Decoding document"
    );

    let (tx, mut rx) = mpsc::channel::<DecodedPage>(REPORT_EVERY_PAGES);
    let bytes = upload.bytes;
    let worker = tokio::task::spawn_blocking(move || {
        decoder.decode(&bytes, &mut |page| tx.blocking_send(page).is_ok())
    });

    let mut assembler = PageAssembler::default();
    let mut pages_seen = 0usize;
    while let Some(page) = rx.recv().await {
        assembler.push(&page.text);
        pages_seen = page.pages_done();
        if page.is_report_point() {
            session
                .status(
                    "parsing_document",
                    format!("Extracted text from {}/{} pages", page.pages_done(), page.total),
                )
                .await?;
        }
    }

    let total = worker
        .await
        .map_err(|e| acquisition(DocumentError::Task(e.to_string())))?
        .map_err(acquisition)?;

    if total == 0 {
        return Err(acquisition(DocumentError::NoPages));
    }
    if assembler.text.trim().is_empty() {
        return Err(acquisition(DocumentError::NoText));
    }

    info!(
        session_id = %session.id(),
        pages = total,
        chars = assembler.text.len(),
        "Document decoded"
    );

    Ok(AcquiredInput {
        source_identifier: identifier.clone(),
        raw_content: json!({
            "filename": identifier,
            "media_type": upload.media_type,
            "pages": pages_seen,
            "text": assembler.text,
        }),
        text: assembler.text,
    })
}
