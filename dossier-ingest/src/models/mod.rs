//! Data models for dossier-ingest

pub mod knowledge_source;
pub mod session;

pub use knowledge_source::{KnowledgeSource, NewKnowledgeSource, SourceSummary};
pub use session::{
    transition, InvalidTransition, PipelineState, SessionInput, SessionState, StateTransition,
};
