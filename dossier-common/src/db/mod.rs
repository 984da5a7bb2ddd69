//! Database initialization and shared schema

pub mod init;

pub use init::{init_database, init_database_with, SCHEMA_VERSION};
