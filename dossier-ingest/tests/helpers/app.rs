//! Router wired to fakes over a temp-file database

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use dossier_common::config::ServiceConfig;
use dossier_common::events::PipelineEvent;
use dossier_ingest::acquire::DocumentDecoders;
use dossier_ingest::auth::StaticTokenIdentity;
use dossier_ingest::merge::{MergeResolver, ProfileMerger, RuleResolver, ServiceResolver};
use dossier_ingest::pipeline::{PipelineContext, UserLocks};
use dossier_ingest::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

use super::fakes::{FakeExtractor, FakeNetwork};

pub const ALICE: &str = "token-alice";
pub const BOB: &str = "token-bob";

const BOUNDARY: &str = "dossier-test-boundary";

/// Test application; keep it alive for the duration of the test
pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub extractor: Arc<FakeExtractor>,
    pub network: Arc<FakeNetwork>,
    _dir: TempDir,
}

/// Create test app with a fresh database and fake collaborators
pub async fn create_test_app(network_payload: Value) -> TestApp {
    build_test_app(network_payload, false).await
}

/// Test app whose aggregation is resolved by the fake extraction service
pub async fn create_service_merge_app() -> TestApp {
    build_test_app(serde_json::json!([{ "name": "unused" }]), true).await
}

async fn build_test_app(network_payload: Value, service_merge: bool) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let pool = dossier_common::db::init_database(&dir.path().join("dossier_test.db"))
        .await
        .expect("Failed to initialize database");

    let extractor = Arc::new(FakeExtractor::new(6));
    let network = Arc::new(FakeNetwork::new(network_payload));

    let resolver: Arc<dyn MergeResolver> = if service_merge {
        Arc::new(ServiceResolver::new(extractor.clone()))
    } else {
        Arc::new(RuleResolver)
    };

    let pipeline = PipelineContext {
        db: pool.clone(),
        extractor: extractor.clone(),
        network: network.clone(),
        decoders: DocumentDecoders::default(),
        merger: ProfileMerger::default(),
        resolver,
        locks: UserLocks::new(),
        max_lock_wait_ms: 2000,
        last_error: Default::default(),
    };
    let identity = StaticTokenIdentity::new(HashMap::from([
        (ALICE.to_string(), "alice".to_string()),
        (BOB.to_string(), "bob".to_string()),
    ]));

    let state = AppState::new(ServiceConfig::default(), Arc::new(identity), pipeline);

    TestApp {
        router: dossier_ingest::build_router(state),
        pool,
        extractor,
        network,
        _dir: dir,
    }
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

/// Request without a body
pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .body(Body::empty())
        .unwrap()
}

/// JSON POST request
pub fn json_request(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method(Method::POST).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Multipart POST request; `file` is `(filename, content type, bytes)`
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    with_auth(Request::builder().method(Method::POST).uri(uri), token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Send a request and collect status, content type and body
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

/// Send a streaming request and decode its events
pub async fn sse_events(app: &TestApp, request: Request<Body>) -> Vec<PipelineEvent> {
    let (status, content_type, body) = send(app, request).await;
    assert_eq!(status, StatusCode::OK, "unexpected status, body: {}", body);
    assert!(
        content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/event-stream")),
        "unexpected content type {:?}",
        content_type
    );
    dossier_common::sse::decode_frames(&body).unwrap()
}
