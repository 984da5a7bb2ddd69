//! Pipeline event types
//!
//! Every ingestion or aggregation request produces one ordered stream of
//! tagged events. Each event is a `(type, payload)` pair where type is one of
//! `status`, `token`, `complete`, `error`.
//!
//! Concatenating the payloads of all `token` events in emission order
//! reconstructs the raw extraction output exactly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::{PartialProfile, UnifiedProfile};

/// Progress or phase notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_count: Option<usize>,
}

/// One extraction output fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token: String,
}

/// Profile carried by the terminal `complete` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfilePayload {
    Unified(Box<UnifiedProfile>),
    Partial(Box<PartialProfile>),
}

/// Terminal success event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    pub profile: ProfilePayload,
    /// Request-specific details (source id, source type, counts, ...)
    pub metadata: Value,
}

/// Terminal failure event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Event emitted by a pipeline session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum PipelineEvent {
    Status(StatusPayload),
    Token(TokenPayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

impl PipelineEvent {
    pub fn status(status: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineEvent::Status(StatusPayload {
            status: status.into(),
            message: message.into(),
            sources_count: None,
        })
    }

    pub fn status_with_count(
        status: impl Into<String>,
        message: impl Into<String>,
        sources_count: usize,
    ) -> Self {
        PipelineEvent::Status(StatusPayload {
            status: status.into(),
            message: message.into(),
            sources_count: Some(sources_count),
        })
    }

    pub fn token(token: impl Into<String>) -> Self {
        PipelineEvent::Token(TokenPayload {
            token: token.into(),
        })
    }

    pub fn complete(profile: ProfilePayload, metadata: Value) -> Self {
        PipelineEvent::Complete(CompletePayload { profile, metadata })
    }

    pub fn error(error: impl Into<String>) -> Self {
        PipelineEvent::Error(ErrorPayload {
            error: error.into(),
        })
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::Status(_) => "status",
            PipelineEvent::Token(_) => "token",
            PipelineEvent::Complete(_) => "complete",
            PipelineEvent::Error(_) => "error",
        }
    }

    /// `complete` and `error` close the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineEvent::Complete(_) | PipelineEvent::Error(_))
    }

    /// Serialize only the payload (the `data:` line of an SSE frame)
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            PipelineEvent::Status(p) => serde_json::to_string(p),
            PipelineEvent::Token(p) => serde_json::to_string(p),
            PipelineEvent::Complete(p) => serde_json::to_string(p),
            PipelineEvent::Error(p) => serde_json::to_string(p),
        }
    }

    /// Rebuild an event from its wire type and payload
    pub fn from_wire(event_type: &str, payload: &str) -> serde_json::Result<Self> {
        let value = serde_json::json!({
            "type": event_type,
            "payload": serde_json::from_str::<Value>(payload)?,
        });
        serde_json::from_value(value)
    }
}

/// Concatenate the token payloads of a recorded event sequence.
pub fn concat_tokens<'a>(events: impl IntoIterator<Item = &'a PipelineEvent>) -> String {
    events
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::Token(t) => Some(t.token.as_str()),
            _ => None,
        })
        .collect()
}
