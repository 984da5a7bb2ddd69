//! Pipeline session driver
//!
//! Wraps the pure [`SessionState`] machine with an event sink. Every state
//! change goes through [`PipelineSession::advance`]; every event goes out
//! through [`PipelineSession::emit`], which turns a closed sink into
//! [`PipelineError::Cancelled`].

use axum::http::HeaderMap;
use dossier_common::events::{PipelineEvent, ProfilePayload};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::emitter::EventSink;
use crate::auth::{authenticate_headers, AuthenticatedUser, IdentityProvider};
use crate::error::PipelineError;
use crate::extraction::TokenStream;
use crate::models::{PipelineState, SessionInput, SessionState};

/// One ingestion or aggregation run
pub struct PipelineSession {
    state: SessionState,
    sink: Arc<dyn EventSink>,
    user: Option<AuthenticatedUser>,
}

impl PipelineSession {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: SessionState::new(),
            sink,
            user: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.session_id
    }

    pub fn state(&self) -> PipelineState {
        self.state.state
    }

    /// Authenticated user, once `authenticate` succeeded
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.user_id.as_str())
    }

    pub(crate) fn require_user(&self) -> Result<String, PipelineError> {
        self.user_id()
            .map(str::to_owned)
            .ok_or_else(|| PipelineError::Auth("session is not authenticated".to_string()))
    }

    /// Apply one state-machine input.
    pub fn advance(&mut self, input: SessionInput) -> Result<(), PipelineError> {
        let record = self
            .state
            .apply(input)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        if record.old_state != record.new_state {
            debug!(
                session_id = %record.session_id,
                from = %record.old_state,
                to = %record.new_state,
                "Session transition"
            );
        }
        Ok(())
    }

    /// `Init → Authenticated` from the request's bearer credential.
    pub async fn authenticate(
        &mut self,
        identity: &dyn IdentityProvider,
        headers: &HeaderMap,
    ) -> Result<(), PipelineError> {
        let user = authenticate_headers(identity, headers).await?;
        debug!(session_id = %self.id(), user_id = %user.user_id, "Credential accepted");
        self.user = Some(user);
        self.advance(SessionInput::CredentialAccepted)
    }

    /// `Authenticated → Acquiring`; the event stream is open from here on.
    pub fn accept_request(&mut self) -> Result<(), PipelineError> {
        self.advance(SessionInput::RequestAccepted)
    }

    /// Deliver one event.
    pub async fn emit(&self, event: PipelineEvent) -> Result<(), PipelineError> {
        self.sink.send(event).await.map_err(|_| {
            warn!(session_id = %self.id(), "Event sink closed");
            PipelineError::Cancelled
        })
    }

    pub async fn status(
        &self,
        status: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), PipelineError> {
        self.emit(PipelineEvent::status(status, message)).await
    }

    pub async fn status_with_count(
        &self,
        status: impl Into<String>,
        message: impl Into<String>,
        sources_count: usize,
    ) -> Result<(), PipelineError> {
        self.emit(PipelineEvent::status_with_count(status, message, sources_count))
            .await
    }

    /// Fail with `Cancelled` if the client has gone away.
    pub fn ensure_connected(&self) -> Result<(), PipelineError> {
        if self.sink.is_closed() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Relay an extraction stream, one `token` event per fragment.
    ///
    /// Returns the concatenated output. The next fragment is pulled only
    /// after the previous one was handed to the sink. Returning early drops
    /// the stream, which aborts the underlying request.
    pub async fn relay(&mut self, mut stream: TokenStream) -> Result<String, PipelineError> {
        self.advance(SessionInput::StreamOpened)?;

        let mut output = String::new();
        let mut fragments = 0usize;
        loop {
            self.ensure_connected()?;
            let Some(fragment) = stream.next().await else {
                break;
            };
            let fragment = fragment.map_err(|e| PipelineError::Extraction(e.to_string()))?;
            if fragment.is_empty() {
                continue;
            }

            self.advance(SessionInput::FragmentRelayed)?;
            output.push_str(&fragment);
            fragments += 1;
            self.emit(PipelineEvent::token(fragment)).await?;
        }

        self.advance(SessionInput::StreamEnded)?;
        debug!(
            session_id = %self.id(),
            fragments,
            chars = output.len(),
            "Extraction stream ended"
        );
        Ok(output)
    }

    /// `Finalizing → Complete` and the terminal `complete` event.
    pub async fn complete(
        &mut self,
        profile: ProfilePayload,
        metadata: Value,
    ) -> Result<(), PipelineError> {
        self.advance(SessionInput::Persisted)?;
        info!(session_id = %self.id(), "Session complete");
        self.emit(PipelineEvent::complete(profile, metadata)).await
    }

    /// Move to `Failed` and report `err` where the stream allows it.
    ///
    /// Pre-stream failures and cancellations emit nothing; the caller gets
    /// the error back to answer out of band.
    pub async fn fail(&mut self, err: PipelineError) -> PipelineError {
        if self.state.is_terminal() {
            return err;
        }
        let pre_stream = self.state().is_pre_stream();
        let failed_in = self.state();
        if let Err(e) = self.advance(SessionInput::Fail) {
            warn!(session_id = %self.id(), error = %e, "Could not record failure");
        }

        match &err {
            PipelineError::Cancelled => {
                info!(session_id = %self.id(), state = %failed_in, "Client disconnected, session abandoned");
            }
            _ if pre_stream => {
                warn!(
                    session_id = %self.id(),
                    kind = err.kind(),
                    error = %err,
                    "Request rejected before stream opened"
                );
            }
            _ => {
                error!(
                    session_id = %self.id(),
                    state = %failed_in,
                    kind = err.kind(),
                    error = %err,
                    "Session failed"
                );
                if self.sink.send(PipelineEvent::error(err.to_string())).await.is_err() {
                    warn!(session_id = %self.id(), "Event sink closed before error event");
                }
            }
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenIdentity;
    use crate::extraction::ExtractionError;
    use crate::pipeline::emitter::RecordingSink;
    use axum::http::{header, HeaderValue};
    use dossier_common::events::concat_tokens;
    use std::collections::HashMap;

    fn fragments(parts: &[&str]) -> TokenStream {
        let parts: Vec<Result<String, ExtractionError>> =
            parts.iter().map(|p| Ok(p.to_string())).collect();
        futures::stream::iter(parts).boxed()
    }

    async fn open_session(sink: Arc<RecordingSink>) -> PipelineSession {
        let identity = StaticTokenIdentity::new(HashMap::from([(
            "tok".to_string(),
            "user-1".to_string(),
        )]));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));

        let mut session = PipelineSession::new(sink);
        session.authenticate(&identity, &headers).await.unwrap();
        session.accept_request().unwrap();
        session.advance(SessionInput::InputAcquired).unwrap();
        session
    }

    #[tokio::test]
    async fn test_relay_emits_one_token_per_fragment() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = open_session(sink.clone()).await;

        let output = session
            .relay(fragments(&["{\"na", "", "me\": ", "\"Ada\"}"]))
            .await
            .unwrap();

        assert_eq!(output, "{\"name\": \"Ada\"}");
        assert_eq!(session.state(), PipelineState::Finalizing);
        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(concat_tokens(&events), output);
    }

    #[tokio::test]
    async fn test_stream_error_fails_in_band() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = open_session(sink.clone()).await;

        let stream = futures::stream::iter(vec![
            Ok("{".to_string()),
            Err(ExtractionError::Malformed("bad chunk".into())),
        ])
        .boxed();
        let err = session.relay(stream).await.unwrap_err();
        let err = session.fail(err).await;

        assert!(matches!(err, PipelineError::Extraction(_)));
        assert_eq!(session.state(), PipelineState::Failed);
        let events = sink.events();
        assert!(matches!(events.last(), Some(PipelineEvent::Error(_))));
    }

    #[tokio::test]
    async fn test_disconnect_cancels_without_error_event() {
        let sink = Arc::new(RecordingSink::closing_after(1));
        let mut session = open_session(sink.clone()).await;

        let err = session.relay(fragments(&["a", "b", "c"])).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        session.fail(err).await;

        assert_eq!(session.state(), PipelineState::Failed);
        assert_eq!(sink.events(), vec![PipelineEvent::token("a")]);
    }

    #[tokio::test]
    async fn test_pre_stream_failure_emits_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = PipelineSession::new(sink.clone());
        let identity = StaticTokenIdentity::default();

        let err = session
            .authenticate(&identity, &HeaderMap::new())
            .await
            .unwrap_err();
        let err = session.fail(err).await;

        assert!(matches!(err, PipelineError::Auth(_)));
        assert_eq!(session.state(), PipelineState::Failed);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_order_input_is_internal_error() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = PipelineSession::new(sink);
        let err = session.advance(SessionInput::Persisted).unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
        assert_eq!(session.state(), PipelineState::Init);
    }
}
