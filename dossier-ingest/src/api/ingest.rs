//! Ingestion endpoints
//!
//! POST /ingest/document (multipart), POST /ingest/network (JSON),
//! POST /ingest/text (JSON). Each answers with an event stream, or with a
//! plain 500 JSON error when the request is rejected before the stream opens.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    http::HeaderMap,
    response::Response,
    routing::post,
    Json, Router,
};
use dossier_common::profile::SourceType;
use serde::Deserialize;
use std::sync::Arc;

use super::sse::{open_stream, reject};
use crate::acquire::{DocumentUpload, NetworkRequest};
use crate::error::PipelineError;
use crate::pipeline::{run_ingestion, ChannelSink, IngestRequest, PipelineSession};
use crate::AppState;

/// Default `sourceId` for submitted text
const MANUAL_TEXT_ID: &str = "manual-text";

/// POST /ingest/network body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIngestBody {
    pub url: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
}

/// POST /ingest/text body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextIngestBody {
    pub source_id: Option<String>,
    pub text: Option<String>,
    pub source_type: Option<String>,
}

fn input(message: impl Into<String>) -> PipelineError {
    PipelineError::Input(message.into())
}

fn required(value: Option<String>, name: &str) -> Result<String, PipelineError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| input(format!("{} is required", name)))
}

/// Parse `sourceType`, falling back to `default`, and check it is allowed here.
fn source_type(
    value: Option<String>,
    default: SourceType,
    allowed: impl Fn(SourceType) -> bool,
) -> Result<SourceType, PipelineError> {
    let source_type = match value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        Some(name) => name
            .parse::<SourceType>()
            .map_err(|_| input(format!("Unknown sourceType '{}'", name)))?,
        None => default,
    };
    if !allowed(source_type) {
        return Err(input(format!(
            "sourceType '{}' is not accepted by this endpoint",
            source_type
        )));
    }
    Ok(source_type)
}

fn is_document_type(source_type: SourceType) -> bool {
    matches!(
        source_type,
        SourceType::Resume
            | SourceType::ProjectDocument
            | SourceType::Portfolio
            | SourceType::OtherDocument
    )
}

async fn read_document_form(multipart: Multipart) -> Result<DocumentUpload, PipelineError> {
    let mut multipart = multipart;
    let mut source_id = None;
    let mut source_type_field = None;
    let mut file = None;

    let bad_form = |e: axum::extract::multipart::MultipartError| {
        input(format!("Invalid multipart body: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "sourceId" => source_id = Some(field.text().await.map_err(bad_form)?),
            "sourceType" => source_type_field = Some(field.text().await.map_err(bad_form)?),
            "file" => {
                let filename = field.file_name().map(str::to_owned);
                let media_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_form)?;
                file = Some((filename, media_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let source_id = required(source_id, "sourceId")?;
    let (filename, media_type, bytes) = file
        .filter(|(_, _, bytes)| !bytes.is_empty())
        .ok_or_else(|| input("file is required"))?;
    let source_type = source_type(source_type_field, SourceType::Resume, is_document_type)?;

    Ok(DocumentUpload {
        source_id,
        source_type,
        filename,
        media_type,
        bytes,
    })
}

/// POST /ingest/document
pub async fn ingest_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let (sink, rx) = ChannelSink::channel();
    let mut session = PipelineSession::new(Arc::new(sink));

    if let Err(e) = session.authenticate(state.identity.as_ref(), &headers).await {
        return reject(&state, &mut session, e).await;
    }

    let upload = match multipart {
        Ok(multipart) => read_document_form(multipart).await,
        Err(rejection) => Err(input(format!("Expected a multipart form: {}", rejection))),
    };
    let upload = match upload {
        Ok(upload) => upload,
        Err(e) => return reject(&state, &mut session, e).await,
    };

    tracing::info!(
        session_id = %session.id(),
        source_id = %upload.source_id,
        filename = ?upload.filename,
        bytes = upload.bytes.len(),
        "Document ingestion requested"
    );

    let request = IngestRequest::Document(upload);
    open_stream(&state, session, rx, move |ctx, session| {
        run_ingestion(ctx, session, request)
    })
    .await
}

/// POST /ingest/network
pub async fn ingest_network(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NetworkIngestBody>, JsonRejection>,
) -> Response {
    let (sink, rx) = ChannelSink::channel();
    let mut session = PipelineSession::new(Arc::new(sink));

    if let Err(e) = session.authenticate(state.identity.as_ref(), &headers).await {
        return reject(&state, &mut session, e).await;
    }

    let request = body
        .map_err(|rejection| input(format!("Invalid JSON body: {}", rejection.body_text())))
        .and_then(|Json(body)| {
            Ok(NetworkRequest {
                url: required(body.url, "url")?,
                source_id: required(body.source_id, "sourceId")?,
                source_type: source_type(body.source_type, SourceType::Linkedin, |t| {
                    t.is_network()
                })?,
            })
        });
    let request = match request {
        Ok(request) => request,
        Err(e) => return reject(&state, &mut session, e).await,
    };

    tracing::info!(
        session_id = %session.id(),
        source_id = %request.source_id,
        source_type = ?request.source_type,
        "Network profile ingestion requested"
    );

    let request = IngestRequest::Network(request);
    open_stream(&state, session, rx, move |ctx, session| {
        run_ingestion(ctx, session, request)
    })
    .await
}

/// POST /ingest/text
pub async fn ingest_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<TextIngestBody>, JsonRejection>,
) -> Response {
    let (sink, rx) = ChannelSink::channel();
    let mut session = PipelineSession::new(Arc::new(sink));

    if let Err(e) = session.authenticate(state.identity.as_ref(), &headers).await {
        return reject(&state, &mut session, e).await;
    }

    let upload = body
        .map_err(|rejection| input(format!("Invalid JSON body: {}", rejection.body_text())))
        .and_then(|Json(body)| {
            let text = body
                .text
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| input("text is required"))?;
            Ok(DocumentUpload {
                source_id: body
                    .source_id
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| MANUAL_TEXT_ID.to_string()),
                source_type: source_type(body.source_type, SourceType::ManualText, |t| {
                    !t.is_network()
                })?,
                filename: None,
                media_type: Some("text/plain".to_string()),
                bytes: text.into_bytes(),
            })
        });
    let upload = match upload {
        Ok(upload) => upload,
        Err(e) => return reject(&state, &mut session, e).await,
    };

    tracing::info!(
        session_id = %session.id(),
        source_id = %upload.source_id,
        chars = upload.bytes.len(),
        "Text ingestion requested"
    );

    let request = IngestRequest::Text(upload);
    open_stream(&state, session, rx, move |ctx, session| {
        run_ingestion(ctx, session, request)
    })
    .await
}

/// Build ingestion routes
pub fn ingest_routes() -> Router<AppState> {
    Router::new()
        .route("/ingest/document", post(ingest_document))
        .route("/ingest/network", post(ingest_network))
        .route("/ingest/text", post(ingest_text))
}
