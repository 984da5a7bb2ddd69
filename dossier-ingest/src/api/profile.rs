//! Read endpoints: GET /profile, GET /sources

use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
use dossier_common::profile::UnifiedProfile;
use serde::Serialize;

use crate::auth::authenticate_headers;
use crate::db::load_sources;
use crate::error::{ApiError, ApiResult};
use crate::models::SourceSummary;
use crate::AppState;

/// GET /sources response
#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceSummary>,
    pub count: usize,
}

/// GET /profile
///
/// The caller's Unified Profile; 404 until the first aggregation.
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<UnifiedProfile>> {
    let user = authenticate_headers(state.identity.as_ref(), &headers).await?;

    crate::db::load_profile(&state.db, &user.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("unified profile".to_string()))
}

/// GET /sources
///
/// The caller's knowledge sources, most recent first, without raw content.
pub async fn list_sources(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<SourcesResponse>> {
    let user = authenticate_headers(state.identity.as_ref(), &headers).await?;

    let sources: Vec<SourceSummary> = load_sources(&state.db, &user.user_id)
        .await?
        .iter()
        .map(SourceSummary::from)
        .collect();

    Ok(Json(SourcesResponse {
        count: sources.len(),
        sources,
    }))
}

/// Build read routes
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/sources", get(list_sources))
}
