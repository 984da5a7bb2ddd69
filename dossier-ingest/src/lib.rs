//! dossier-ingest library interface
//!
//! Profile ingestion service: documents, submitted text and remote profiles
//! are extracted into Partial Profiles and merged into one Unified Profile
//! per user, with progress streamed over Server-Sent Events.

pub mod acquire;
pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod extraction;
pub mod merge;
pub mod models;
pub mod parser;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult, PipelineError};

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use dossier_common::config::ServiceConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::IdentityProvider;
use crate::pipeline::PipelineContext;

/// Largest accepted request body (document uploads)
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<ServiceConfig>,
    /// Bearer credential resolution
    pub identity: Arc<dyn IdentityProvider>,
    /// Collaborators for pipeline sessions
    pub pipeline: Arc<PipelineContext>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last unexpected failure, shared with the pipeline context
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        identity: Arc<dyn IdentityProvider>,
        pipeline: PipelineContext,
    ) -> Self {
        Self {
            db: pipeline.db.clone(),
            config: Arc::new(config),
            identity,
            last_error: pipeline.last_error.clone(),
            pipeline: Arc::new(pipeline),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ingest_routes())
        .merge(api::aggregate_routes())
        .merge(api::profile_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
