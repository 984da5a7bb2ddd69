//! Database access for the ingestion pipeline

pub mod profiles;
pub mod retry;
pub mod sources;

pub use profiles::{load_profile, upsert_profile, UpsertOutcome};
pub use retry::retry_on_lock;
pub use sources::{count_sources, insert_source, load_sources};
