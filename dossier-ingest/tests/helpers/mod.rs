//! Test Helper Utilities
//!
//! Shared utilities for testing dossier-ingest

#![allow(dead_code)]

pub mod app;
pub mod fakes;

pub use app::{
    create_service_merge_app, create_test_app, empty_request, json_request, multipart_request,
    send, sse_events, TestApp, ALICE, BOB,
};
pub use fakes::{FakeExtractor, FakeNetwork};
