//! Pipeline orchestration
//!
//! # Ingestion
//! acquire → extract (relayed) → parse + schema check → insert KnowledgeSource
//!
//! # Aggregation
//! load sources → rule baseline → resolver (relayed) → parse + reconcile →
//! schema check → upsert Unified Profile
//!
//! Both run on a session that already passed authentication and request
//! validation (state `Acquiring`). Any failure goes through
//! [`PipelineSession::fail`], so the stream always ends with exactly one
//! terminal event unless the client went away.

use dossier_common::config::{MergeResolverKind, ServiceConfig};
use dossier_common::events::ProfilePayload;
use dossier_common::profile::SourceType;
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::locks::UserLocks;
use super::session::PipelineSession;
use crate::acquire::{
    document::acquire_document, network::acquire_network, AcquiredInput, DocumentDecoders,
    DocumentUpload, HttpNetworkProvider, NetworkProfileProvider, NetworkRequest,
};
use crate::db::{insert_source, load_sources, upsert_profile, UpsertOutcome};
use crate::error::PipelineError;
use crate::extraction::{
    ExtractionError, ExtractionRequest, ExtractionService, InstructionRole,
    OpenAiCompatibleClient,
};
use crate::merge::{CanonicalSkills, MergeResolver, ProfileMerger, RuleResolver, ServiceResolver};
use crate::models::{NewKnowledgeSource, PipelineState, SessionInput};
use crate::parser::{parse_merged_profile, parse_partial_profile};

/// Message of the in-band error for an empty source set
pub const NO_SOURCES_MESSAGE: &str =
    "No knowledge sources found for this user. Ingest at least one source before aggregating.";

/// Collaborators shared by all sessions
pub struct PipelineContext {
    pub db: SqlitePool,
    pub extractor: Arc<dyn ExtractionService>,
    pub network: Arc<dyn NetworkProfileProvider>,
    pub decoders: DocumentDecoders,
    pub merger: ProfileMerger,
    pub resolver: Arc<dyn MergeResolver>,
    pub locks: UserLocks,
    /// Lock-wait budget for store writes
    pub max_lock_wait_ms: u64,
    /// Last unexpected session failure, surfaced by the health endpoint
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl PipelineContext {
    /// Wire the production collaborators from configuration.
    pub fn from_config(db: SqlitePool, config: &ServiceConfig) -> dossier_common::Result<Self> {
        let extractor: Arc<dyn ExtractionService> = Arc::new(
            OpenAiCompatibleClient::new(&config.extraction)
                .map_err(|e| dossier_common::Error::Config(e.to_string()))?,
        );
        let network: Arc<dyn NetworkProfileProvider> = Arc::new(
            HttpNetworkProvider::new(&config.network)
                .map_err(|e| dossier_common::Error::Config(e.to_string()))?,
        );
        let resolver: Arc<dyn MergeResolver> = match config.merge.resolver {
            MergeResolverKind::Rules => Arc::new(RuleResolver),
            MergeResolverKind::Service => Arc::new(ServiceResolver::new(extractor.clone())),
        };

        Ok(Self {
            db,
            extractor,
            network,
            decoders: DocumentDecoders::default(),
            merger: ProfileMerger::new(CanonicalSkills::with_extra(&config.merge.canonical_skills)),
            resolver,
            locks: UserLocks::new(),
            max_lock_wait_ms: config.database.max_lock_wait_ms,
            last_error: Arc::new(RwLock::new(None)),
        })
    }

    /// Remember a failure for diagnostics. Rejected credentials, invalid
    /// requests and client disconnects are not recorded.
    pub async fn record_failure(&self, err: &PipelineError) {
        if matches!(
            err,
            PipelineError::Auth(_) | PipelineError::Input(_) | PipelineError::Cancelled
        ) {
            return;
        }
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Validated ingestion request
#[derive(Debug, Clone)]
pub enum IngestRequest {
    /// Uploaded file (PDF or text)
    Document(DocumentUpload),
    /// Submitted text; form feeds separate pages
    Text(DocumentUpload),
    /// Remote profile URL
    Network(NetworkRequest),
}

impl IngestRequest {
    pub fn source_type(&self) -> SourceType {
        match self {
            IngestRequest::Document(u) | IngestRequest::Text(u) => u.source_type,
            IngestRequest::Network(r) => r.source_type,
        }
    }

    /// Client correlation id
    pub fn source_id(&self) -> &str {
        match self {
            IngestRequest::Document(u) | IngestRequest::Text(u) => &u.source_id,
            IngestRequest::Network(r) => &r.source_id,
        }
    }
}

fn extraction_failed(err: ExtractionError) -> PipelineError {
    PipelineError::Extraction(err.to_string())
}

/// Run an ingestion session to its terminal state.
pub async fn run_ingestion(
    ctx: Arc<PipelineContext>,
    mut session: PipelineSession,
    request: IngestRequest,
) -> PipelineState {
    if let Err(err) = ingest(&ctx, &mut session, request).await {
        ctx.record_failure(&err).await;
        session.fail(err).await;
    }
    session.state()
}

/// Run an aggregation session to its terminal state.
pub async fn run_aggregation(ctx: Arc<PipelineContext>, mut session: PipelineSession) -> PipelineState {
    if let Err(err) = aggregate(&ctx, &mut session).await {
        ctx.record_failure(&err).await;
        session.fail(err).await;
    }
    session.state()
}

async fn acquire(
    ctx: &PipelineContext,
    session: &mut PipelineSession,
    request: IngestRequest,
) -> Result<AcquiredInput, PipelineError> {
    match request {
        IngestRequest::Document(upload) => acquire_document(&ctx.decoders, upload, session).await,
        IngestRequest::Text(upload) => {
            acquire_document(&DocumentDecoders::text_only(), upload, session).await
        }
        IngestRequest::Network(request) => {
            acquire_network(ctx.network.as_ref(), request, session).await
        }
    }
}

async fn ingest(
    ctx: &PipelineContext,
    session: &mut PipelineSession,
    request: IngestRequest,
) -> Result<(), PipelineError> {
    let user_id = session.require_user()?;
    let source_type = request.source_type();
    let source_id = request.source_id().to_string();

    info!(
        session_id = %session.id(),
        user_id = %user_id,
        source_type = ?source_type,
        source_id = %source_id,
        "Ingestion started"
    );
    session
        .status("acquiring", format!("Reading {} source", source_type))
        .await?;

    let acquired = acquire(ctx, session, request).await?;
    session.advance(SessionInput::InputAcquired)?;

    session
        .status("extracting", "Extracting profile data")
        .await?;
    let stream = ctx
        .extractor
        .stream(ExtractionRequest::new(
            InstructionRole::for_source(source_type),
            acquired.text,
        ))
        .await
        .map_err(extraction_failed)?;
    let output = session.relay(stream).await?;

    let profile = parse_partial_profile(&output, source_type)?;

    session.status("saving", "Saving knowledge source").await?;
    session.ensure_connected()?;
    let stored = insert_source(
        &ctx.db,
        NewKnowledgeSource {
            user_id: user_id.clone(),
            source_type,
            source_identifier: acquired.source_identifier,
            raw_content: acquired.raw_content,
            parsed_data: profile.clone(),
        },
        ctx.max_lock_wait_ms,
    )
    .await?;

    info!(
        session_id = %session.id(),
        user_id = %user_id,
        knowledge_source_id = %stored.id,
        "Knowledge source stored"
    );

    let metadata = json!({
        "sourceId": source_id,
        "knowledge_source_id": stored.id,
        "source_type": source_type,
        "source_identifier": stored.source_identifier,
    });
    session
        .complete(ProfilePayload::Partial(Box::new(profile)), metadata)
        .await
}

async fn aggregate(ctx: &PipelineContext, session: &mut PipelineSession) -> Result<(), PipelineError> {
    let user_id = session.require_user()?;
    let _guard = ctx.locks.acquire(&user_id).await;

    info!(session_id = %session.id(), user_id = %user_id, "Aggregation started");
    session
        .status("loading_sources", "Loading knowledge sources")
        .await?;

    let sources = load_sources(&ctx.db, &user_id).await?;
    if sources.is_empty() {
        return Err(PipelineError::Input(NO_SOURCES_MESSAGE.to_string()));
    }
    session.advance(SessionInput::InputAcquired)?;

    let count = sources.len();
    session
        .status_with_count(
            "merging",
            format!("Merging {} knowledge sources", count),
            count,
        )
        .await?;

    let baseline = ctx.merger.baseline(&sources);
    let stream = ctx
        .resolver
        .resolve(&sources, &baseline)
        .await
        .map_err(extraction_failed)?;
    let output = session.relay(stream).await?;

    let resolved = parse_merged_profile(&output)?;
    let body = ctx.merger.reconcile(resolved, &baseline);
    let unified = ctx.merger.finalize(body, &sources);
    unified
        .validate()
        .map_err(|e| PipelineError::Parse(format!("schema violation at {}", e)))?;

    session.status("saving", "Saving unified profile").await?;
    session.ensure_connected()?;
    let outcome = upsert_profile(&ctx.db, &user_id, &unified, ctx.max_lock_wait_ms).await?;

    info!(
        session_id = %session.id(),
        user_id = %user_id,
        sources = count,
        skills = unified.skill_index.len(),
        outcome = ?outcome,
        "Unified profile saved"
    );

    let metadata = json!({
        "sources_count": count,
        "resolver": ctx.resolver.name(),
        "created": outcome == UpsertOutcome::Created,
    });
    session
        .complete(ProfilePayload::Unified(Box::new(unified)), metadata)
        .await
}
