//! Pipeline sessions: state machine driver, event sinks, orchestration

pub mod emitter;
pub mod locks;
pub mod runner;
pub mod session;

pub use emitter::{ChannelSink, EventSink, RecordingSink, SinkClosed};
pub use locks::UserLocks;
pub use runner::{run_aggregation, run_ingestion, IngestRequest, PipelineContext, NO_SOURCES_MESSAGE};
pub use session::PipelineSession;
