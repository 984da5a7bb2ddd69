//! End-to-end pipeline properties over the HTTP surface:
//! token relay, merge rules, singleton upsert, idempotence and the
//! documented failure scenarios

mod helpers;

use axum::http::Method;
use chrono::Utc;
use dossier_common::events::{concat_tokens, PipelineEvent, ProfilePayload};
use dossier_common::profile::{EntryDate, PartialProfile, UnifiedProfile};
use dossier_ingest::db::{count_sources, load_profile};
use dossier_ingest::parser::strip_code_fence;
use helpers::*;
use serde_json::{json, Value};

async fn app() -> TestApp {
    create_test_app(json!([{ "name": "unused" }])).await
}

/// Ingest submitted text whose extraction yields `output`.
async fn ingest_text(app: &TestApp, token: &str, source_id: &str, output: &str) -> Vec<PipelineEvent> {
    app.extractor.push_output(output);
    sse_events(
        app,
        json_request(
            "/ingest/text",
            Some(token),
            json!({ "sourceId": source_id, "text": format!("Source text for {}", source_id) }),
        ),
    )
    .await
}

async fn aggregate(app: &TestApp, token: &str) -> Vec<PipelineEvent> {
    sse_events(app, empty_request(Method::POST, "/aggregate", Some(token))).await
}

fn unified_from(events: &[PipelineEvent]) -> (UnifiedProfile, Value) {
    match events.last() {
        Some(PipelineEvent::Complete(done)) => match &done.profile {
            ProfilePayload::Unified(profile) => ((**profile).clone(), done.metadata.clone()),
            ProfilePayload::Partial(_) => panic!("expected a unified profile"),
        },
        other => panic!("expected complete event, got {:?}", other),
    }
}

fn assert_single_terminal(events: &[PipelineEvent]) {
    let terminals: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminals, vec![events.len() - 1], "terminal event must be last and unique");
}

#[tokio::test]
async fn test_token_concatenation_reconstructs_output() {
    let app = app().await;
    let output = "```json\n{\n  \"name\": \"Ada Lovelace\",\n  \"email\": \"ada@example.com\",\n  \"skills\": [\"Analytical Engines\", \"Mathematics\"]\n}\n```";

    let events = ingest_text(&app, ALICE, "cv-1", output).await;
    assert_single_terminal(&events);

    let raw = concat_tokens(&events);
    assert_eq!(raw, output);
    assert!(events.iter().filter(|e| matches!(e, PipelineEvent::Token(_))).count() > 1);

    let reparsed: PartialProfile = serde_json::from_str(strip_code_fence(&raw)).unwrap();
    let Some(PipelineEvent::Complete(done)) = events.last() else {
        panic!("expected complete event");
    };
    let ProfilePayload::Partial(delivered) = &done.profile else {
        panic!("expected a partial profile");
    };
    assert_eq!(reparsed.name, delivered.name);
    assert_eq!(reparsed.skills, delivered.skills);
}

#[tokio::test]
async fn test_skill_dedup_across_sources() {
    let app = app().await;
    ingest_text(&app, ALICE, "a", r#"{"skills": ["Python", "communication"]}"#).await;
    ingest_text(&app, ALICE, "b", r#"{"skills": ["python", "Leadership"]}"#).await;

    let (unified, _) = unified_from(&aggregate(&app, ALICE).await);

    assert_eq!(unified.profile.skills.len(), 3, "skills: {:?}", unified.profile.skills);
    let lowered: Vec<String> = unified.profile.skills.iter().map(|s| s.to_lowercase()).collect();
    for expected in ["python", "communication", "leadership"] {
        assert_eq!(lowered.iter().filter(|s| *s == expected).count(), 1);
    }
    assert!(unified.profile.skills.contains(&"Python".to_string()));
    assert_eq!(unified.skill_index.len(), 3);
}

#[tokio::test]
async fn test_experience_sorted_recent_first() {
    let app = app().await;
    ingest_text(
        &app,
        ALICE,
        "older",
        r#"{"experience": [
            {"company": "Difference Engines Ltd", "job_title": "Assistant", "start_date": "2010-01", "end_date": "2012-03"},
            {"company": "Analytical Co", "job_title": "Engineer", "start_date": "2015-01", "end_date": "2018-06"}
        ]}"#,
    )
    .await;
    ingest_text(
        &app,
        ALICE,
        "newer",
        r#"{"experience": [
            {"company": "Jacquard Looms", "job_title": "Lead", "start_date": "2019-01", "end_date": "2021-12"},
            {"company": "Babbage & Co", "job_title": "Principal", "start_date": "2018-07", "end_date": "Present"}
        ]}"#,
    )
    .await;

    let (unified, _) = unified_from(&aggregate(&app, ALICE).await);
    let companies: Vec<&str> = unified
        .profile
        .experience
        .iter()
        .filter_map(|e| e.company.as_deref())
        .collect();
    assert_eq!(
        companies,
        vec!["Babbage & Co", "Jacquard Looms", "Analytical Co", "Difference Engines Ltd"]
    );
    assert_eq!(unified.profile.experience[0].end_date, Some(EntryDate::Present));

    let ends: Vec<_> = unified
        .profile
        .experience
        .iter()
        .skip(1)
        .filter_map(|e| e.end_date.and_then(|d| d.as_date()))
        .collect();
    assert!(ends.windows(2).all(|w| w[0] >= w[1]), "end dates not descending: {:?}", ends);
}

#[tokio::test]
async fn test_repeated_aggregation_updates_single_row() {
    let app = app().await;
    ingest_text(&app, ALICE, "a", r#"{"name": "Ada"}"#).await;
    ingest_text(&app, ALICE, "b", r#"{"name": "Ada Lovelace"}"#).await;

    let (_, first) = unified_from(&aggregate(&app, ALICE).await);
    let (second_profile, second) = unified_from(&aggregate(&app, ALICE).await);

    assert_eq!(first["created"], true);
    assert_eq!(second["created"], false);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_profiles WHERE user_id = ?")
        .bind("alice")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let sources = count_sources(&app.pool, "alice").await.unwrap();
    assert_eq!(second_profile.sources.len() as i64, sources);
    assert_eq!(second_profile.profile.name.as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn test_aggregation_is_idempotent() {
    let app = app().await;
    ingest_text(
        &app,
        ALICE,
        "a",
        r#"{"name": "Ada", "skills": ["Rust", "sql"], "education": [{"institution": "University of London", "degree": "Mathematics"}]}"#,
    )
    .await;
    ingest_text(
        &app,
        ALICE,
        "b",
        r#"{"summary": "Mathematician", "skills": ["SQL"], "projects": [{"name": "Notes on the Engine", "technologies": ["Rust"]}]}"#,
    )
    .await;

    let (first, _) = unified_from(&aggregate(&app, ALICE).await);
    let (second, _) = unified_from(&aggregate(&app, ALICE).await);

    assert!(first.same_content(&second));
    assert!(second.updated_at >= first.updated_at);

    let stored = load_profile(&app.pool, "alice").await.unwrap().unwrap();
    assert!(stored.same_content(&second));
}

#[tokio::test]
async fn test_scenario_no_sources_reports_error_without_write() {
    let app = app().await;

    let events = aggregate(&app, BOB).await;

    assert_single_terminal(&events);
    let Some(PipelineEvent::Error(err)) = events.last() else {
        panic!("expected error event, got {:?}", events.last());
    };
    assert!(err.error.starts_with("No knowledge sources found"));
    assert!(load_profile(&app.pool, "bob").await.unwrap().is_none());
}

#[tokio::test]
async fn test_scenario_unparseable_output_mutates_nothing() {
    let app = app().await;

    let events = ingest_text(&app, ALICE, "bad", "Sorry, I cannot help with that.").await;

    assert_single_terminal(&events);
    let Some(PipelineEvent::Error(err)) = events.last() else {
        panic!("expected error event");
    };
    assert!(err.error.starts_with("Failed to parse extraction output"));
    assert_eq!(count_sources(&app.pool, "alice").await.unwrap(), 0);
    assert!(load_profile(&app.pool, "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_scenario_three_sources_aggregate() {
    let app = app().await;
    ingest_text(&app, ALICE, "one", r#"{"name": "Ada"}"#).await;
    ingest_text(&app, ALICE, "two", r#"{"email": "ada@example.com"}"#).await;
    ingest_text(&app, ALICE, "three", r#"{"skills": ["Go"]}"#).await;
    // Another user's sources never leak in
    ingest_text(&app, BOB, "other", r#"{"name": "Charles"}"#).await;

    let before = Utc::now();
    let events = aggregate(&app, ALICE).await;
    assert_single_terminal(&events);

    let merging = events.iter().find_map(|e| match e {
        PipelineEvent::Status(s) if s.status == "merging" => s.sources_count,
        _ => None,
    });
    assert_eq!(merging, Some(3));

    let (unified, metadata) = unified_from(&events);
    assert_eq!(unified.sources.len(), 3);
    assert!(unified.updated_at >= before);
    assert_eq!(unified.profile.name.as_deref(), Some("Ada"));
    assert_eq!(unified.profile.email.as_deref(), Some("ada@example.com"));
    assert_eq!(metadata["sources_count"], 3);
    assert_eq!(metadata["resolver"], "rules");
}

#[tokio::test]
async fn test_scenario_twelve_page_document() {
    let app = app().await;
    app.extractor.push_output(r#"{"name": "Ada Lovelace"}"#);

    let pages: Vec<String> = (1..=12)
        .map(|n| format!("Page {} of the résumé for Ada Lovelace.", n))
        .collect();
    let document = pages.join("\x0c");

    let events = sse_events(
        &app,
        multipart_request(
            "/ingest/document",
            Some(ALICE),
            &[("sourceId", "cv-12")],
            Some(("cv.txt", "text/plain", document.as_bytes())),
        ),
    )
    .await;
    assert_single_terminal(&events);

    let progress: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Status(s) if s.status == "parsing_document" => Some(s.message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        progress,
        vec![
            "Extracted text from 5/12 pages",
            "Extracted text from 10/12 pages",
            "Extracted text from 12/12 pages",
        ]
    );
    let first_status = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Status(_)))
        .unwrap();
    assert!(first_status < events.len() - 1);

    let requests = app.extractor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].content, pages.join("\n\n"));

    let Some(PipelineEvent::Complete(done)) = events.last() else {
        panic!("expected complete event");
    };
    assert_eq!(done.metadata["source_identifier"], "cv.txt");
    assert_eq!(done.metadata["source_type"], "resume");
}

#[tokio::test]
async fn test_service_merge_unparseable_result_writes_nothing() {
    let app = create_service_merge_app().await;
    ingest_text(&app, ALICE, "a", r#"{"name": "Ada", "skills": ["Rust"]}"#).await;
    app.extractor.push_output("I merged the profiles for you.");

    let events = aggregate(&app, ALICE).await;

    assert_single_terminal(&events);
    let Some(PipelineEvent::Error(err)) = events.last() else {
        panic!("expected error event, got {:?}", events.last());
    };
    assert!(err.error.starts_with("Failed to parse extraction output"));
    assert_eq!(concat_tokens(&events), "I merged the profiles for you.");
    assert!(load_profile(&app.pool, "alice").await.unwrap().is_none());
}

#[tokio::test]
async fn test_service_merge_sparse_result_filled_from_baseline() {
    let app = create_service_merge_app().await;
    ingest_text(&app, ALICE, "a", r#"{"name": "Ada", "email": "ada@example.com"}"#).await;
    ingest_text(&app, ALICE, "b", r#"{"skills": ["Rust", "SQL"]}"#).await;
    app.extractor
        .push_output(r#"{"name": "Ada Lovelace", "summary": "Mathematician"}"#);

    let events = aggregate(&app, ALICE).await;
    assert_single_terminal(&events);
    let (unified, metadata) = unified_from(&events);

    assert_eq!(metadata["resolver"], "service");
    assert_eq!(unified.profile.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(unified.profile.summary.as_deref(), Some("Mathematician"));
    assert_eq!(unified.profile.email.as_deref(), Some("ada@example.com"));
    assert_eq!(unified.profile.skills, vec!["Rust", "SQL"]);

    let requests = app.extractor.requests();
    let merge_request = requests.last().unwrap();
    assert!(merge_request.content.contains("ada@example.com"));

    let stored = load_profile(&app.pool, "alice").await.unwrap().unwrap();
    assert!(stored.same_content(&unified));
}
