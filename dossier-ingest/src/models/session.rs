//! Pipeline session state machine
//!
//! Every ingestion or aggregation request is one session:
//!
//! ```text
//! Init → Authenticated → Acquiring → Extracting → Streaming → Finalizing → Complete
//!   \________\______________\___________\____________\____________\______→ Failed
//! ```
//!
//! `Complete` and `Failed` are terminal. The event stream opens on
//! `Authenticated → Acquiring`; a failure before that is reported out of band.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Init,
    Authenticated,
    Acquiring,
    Extracting,
    Streaming,
    Finalizing,
    Complete,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed)
    }

    /// States in which the event stream is not yet open
    pub fn is_pre_stream(&self) -> bool {
        matches!(self, PipelineState::Init | PipelineState::Authenticated)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Authenticated => "authenticated",
            PipelineState::Acquiring => "acquiring",
            PipelineState::Extracting => "extracting",
            PipelineState::Streaming => "streaming",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Complete => "complete",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// Credential accepted by the identity collaborator
    CredentialAccepted,
    /// Required request fields present (or prior sources exist, for aggregation)
    RequestAccepted,
    /// Input text or source set obtained
    InputAcquired,
    /// Extraction or merge stream opened
    StreamOpened,
    /// One fragment relayed
    FragmentRelayed,
    /// Extraction stream ended normally
    StreamEnded,
    /// Result validated and persisted
    Persisted,
    /// Any failure
    Fail,
}

/// Rejected transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition from {from} on {input:?}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub input: SessionInput,
}

/// Pure transition function.
pub fn transition(
    state: PipelineState,
    input: SessionInput,
) -> Result<PipelineState, InvalidTransition> {
    use PipelineState::*;
    use SessionInput::*;

    let next = match (state, input) {
        (s, Fail) if !s.is_terminal() => Failed,
        (Init, CredentialAccepted) => Authenticated,
        (Authenticated, RequestAccepted) => Acquiring,
        (Acquiring, InputAcquired) => Extracting,
        (Extracting, StreamOpened) => Streaming,
        (Streaming, FragmentRelayed) => Streaming,
        (Streaming, StreamEnded) => Finalizing,
        (Finalizing, Persisted) => Complete,
        (from, input) => return Err(InvalidTransition { from, input }),
    };
    Ok(next)
}

/// Record of one applied transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// Session bookkeeping (no I/O)
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: Uuid,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: PipelineState::Init,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Apply an input, recording the transition.
    pub fn apply(&mut self, input: SessionInput) -> Result<StateTransition, InvalidTransition> {
        let new_state = transition(self.state, input)?;
        let record = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(record.transitioned_at);
        }
        Ok(record)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
