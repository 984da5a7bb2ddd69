//! POST /aggregate: merge every stored source into the Unified Profile

use axum::{extract::State, http::HeaderMap, response::Response, routing::post, Router};
use std::sync::Arc;

use super::sse::{open_stream, reject};
use crate::pipeline::{run_aggregation, ChannelSink, PipelineSession};
use crate::AppState;

/// POST /aggregate
///
/// No request body. An empty source set is reported in-band.
pub async fn aggregate(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (sink, rx) = ChannelSink::channel();
    let mut session = PipelineSession::new(Arc::new(sink));

    if let Err(e) = session.authenticate(state.identity.as_ref(), &headers).await {
        return reject(&state, &mut session, e).await;
    }

    tracing::info!(session_id = %session.id(), "Aggregation requested");
    open_stream(&state, session, rx, run_aggregation).await
}

/// Build aggregation routes
pub fn aggregate_routes() -> Router<AppState> {
    Router::new().route("/aggregate", post(aggregate))
}
