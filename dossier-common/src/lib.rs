//! # Dossier Common Library
//!
//! Shared code for the dossier services including:
//! - Profile schema (Partial Profile, Unified Profile, record entries)
//! - Schema validation and identity-key normalization
//! - Pipeline event types and SSE frame encoding
//! - Configuration loading
//! - Database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod normalize;
pub mod profile;
pub mod sse;

pub use error::{Error, Result};
pub use events::PipelineEvent;
pub use profile::{PartialProfile, SchemaError, SourceType, UnifiedProfile};
