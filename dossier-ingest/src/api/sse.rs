//! Server-Sent Events response for one pipeline session

use axum::response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse, Response,
};
use dossier_common::events::PipelineEvent;
use dossier_common::sse::to_sse_event;
use futures::stream::Stream;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::PipelineState;
use crate::pipeline::{PipelineContext, PipelineSession};
use crate::AppState;

/// Forward session events as SSE frames until the terminal event.
///
/// Dropping the response (client disconnect) drops the receiver, which the
/// session sees as a closed sink.
pub fn session_event_stream(
    mut rx: mpsc::Receiver<PipelineEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            match to_sse_event(&event) {
                Ok(frame) => yield Ok(frame),
                Err(e) => warn!("SSE: Failed to serialize {} event: {}", event.event_type(), e),
            }
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// Answer a request that failed before its stream opened.
pub(crate) async fn reject(
    state: &AppState,
    session: &mut PipelineSession,
    err: PipelineError,
) -> Response {
    state.pipeline.record_failure(&err).await;
    session.fail(err).await.into_response()
}

/// Open the stream and run `run` on a background task.
pub(crate) async fn open_stream<F, Fut>(
    state: &AppState,
    mut session: PipelineSession,
    rx: mpsc::Receiver<PipelineEvent>,
    run: F,
) -> Response
where
    F: FnOnce(Arc<PipelineContext>, PipelineSession) -> Fut,
    Fut: Future<Output = PipelineState> + Send + 'static,
{
    if let Err(e) = session.accept_request() {
        return reject(state, &mut session, e).await;
    }

    let session_id = session.id();
    let task = run(state.pipeline.clone(), session);
    tokio::spawn(async move {
        let final_state = task.await;
        debug!(session_id = %session_id, state = %final_state, "Session task finished");
    });

    session_event_stream(rx).into_response()
}
