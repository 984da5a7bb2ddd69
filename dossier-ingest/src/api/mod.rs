//! HTTP API handlers for dossier-ingest
//!
//! Streaming endpoints answer with `text/event-stream`; read endpoints with
//! plain JSON.

pub mod aggregate;
pub mod health;
pub mod ingest;
pub mod profile;
pub mod sse;

pub use aggregate::aggregate_routes;
pub use health::health_routes;
pub use ingest::ingest_routes;
pub use profile::profile_routes;
pub use sse::session_event_stream;
