//! Knowledge source persistence
//!
//! Rows are only written once an ingestion has fully succeeded, so every row
//! the pipeline writes is `completed`. Reads re-validate `parsed_data` at the
//! store boundary.

use chrono::{DateTime, SecondsFormat, Utc};
use dossier_common::profile::{PartialProfile, ProcessingStatus, SourceType};
use dossier_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use super::retry::retry_on_lock;
use crate::models::{KnowledgeSource, NewKnowledgeSource};

/// Fixed-width RFC 3339 so that text ordering matches time ordering
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Insert a completed knowledge source.
pub async fn insert_source(
    pool: &SqlitePool,
    new: NewKnowledgeSource,
    max_wait_ms: u64,
) -> Result<KnowledgeSource> {
    new.parsed_data.validate()?;

    let now = Utc::now();
    let source = KnowledgeSource {
        id: Uuid::new_v4(),
        user_id: new.user_id,
        source_type: new.source_type,
        source_identifier: new.source_identifier,
        raw_content: new.raw_content,
        parsed_data: Some(new.parsed_data),
        processing_status: ProcessingStatus::Completed,
        error_message: None,
        created_at: now,
        updated_at: now,
    };

    // Prepare all data before touching the pool
    let id = source.id.to_string();
    let raw_content = serde_json::to_string(&source.raw_content)?;
    let parsed_data = serde_json::to_string(&source.parsed_data)?;
    let created_at = format_timestamp(source.created_at);
    let updated_at = format_timestamp(source.updated_at);

    retry_on_lock("insert_source", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO knowledge_sources (
                id, user_id, source_type, source_identifier, raw_content,
                parsed_data, processing_status, error_message, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&source.user_id)
        .bind(source.source_type.as_str())
        .bind(&source.source_identifier)
        .bind(&raw_content)
        .bind(&parsed_data)
        .bind(source.processing_status.as_str())
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    })
    .await?;

    Ok(source)
}

fn row_to_source(row: &SqliteRow) -> Result<KnowledgeSource> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid source id '{}': {}", id, e)))?;

    let source_type: String = row.get("source_type");
    let status: String = row.get("processing_status");

    let raw_content: String = row.get("raw_content");
    let parsed_data: Option<String> = row.get("parsed_data");
    let parsed_data = match parsed_data {
        Some(json) => {
            let profile: Option<PartialProfile> = serde_json::from_str(&json)?;
            if let Some(profile) = &profile {
                profile.validate()?;
            }
            profile
        }
        None => None,
    };

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(KnowledgeSource {
        id,
        user_id: row.get("user_id"),
        source_type: source_type.parse::<SourceType>()?,
        source_identifier: row.get("source_identifier"),
        raw_content: serde_json::from_str(&raw_content)?,
        parsed_data,
        processing_status: status.parse::<ProcessingStatus>()?,
        error_message: row.get("error_message"),
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

/// Completed sources for a user, most recent first.
///
/// Every row is re-validated; a row that no longer fits the schema fails
/// the whole load.
pub async fn load_sources(pool: &SqlitePool, user_id: &str) -> Result<Vec<KnowledgeSource>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, source_type, source_identifier, raw_content, parsed_data,
               processing_status, error_message, created_at, updated_at
        FROM knowledge_sources
        WHERE user_id = ? AND processing_status = 'completed'
        ORDER BY created_at DESC, rowid DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut sources = Vec::with_capacity(rows.len());
    for row in &rows {
        let source = row_to_source(row).map_err(|e| {
            let id: String = row.get("id");
            warn!(source_id = %id, error = %e, "Stored source failed validation");
            e
        })?;
        if source.parsed_data.is_none() {
            return Err(Error::Internal(format!(
                "Completed source {} has no parsed data",
                source.id
            )));
        }
        sources.push(source);
    }
    Ok(sources)
}

/// Number of stored sources for a user.
pub async fn count_sources(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_sources WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_common::db::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    fn new_source(user: &str, identifier: &str, name: &str) -> NewKnowledgeSource {
        NewKnowledgeSource {
            user_id: user.into(),
            source_type: SourceType::Resume,
            source_identifier: identifier.into(),
            raw_content: json!({"text": "..."}),
            parsed_data: PartialProfile {
                name: Some(name.into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_most_recent_first() {
        let (_dir, pool) = setup().await;

        insert_source(&pool, new_source("u1", "old.pdf", "Old"), 1000)
            .await
            .unwrap();
        insert_source(&pool, new_source("u1", "new.pdf", "New"), 1000)
            .await
            .unwrap();
        insert_source(&pool, new_source("u2", "other.pdf", "Other"), 1000)
            .await
            .unwrap();

        let sources = load_sources(&pool, "u1").await.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].source_identifier, "new.pdf");
        assert_eq!(sources[1].source_identifier, "old.pdf");
        assert_eq!(sources[0].processing_status, ProcessingStatus::Completed);
        assert_eq!(
            sources[0].parsed_data.as_ref().unwrap().name.as_deref(),
            Some("New")
        );

        assert_eq!(count_sources(&pool, "u1").await.unwrap(), 2);
        assert_eq!(count_sources(&pool, "nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_parsed_data_rejected_on_insert() {
        let (_dir, pool) = setup().await;
        let mut bad = new_source("u1", "cv.pdf", "Ada");
        bad.parsed_data.email = Some("not an email".into());

        assert!(insert_source(&pool, bad, 1000).await.is_err());
        assert_eq!(count_sources(&pool, "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_row_fails_load() {
        let (_dir, pool) = setup().await;
        insert_source(&pool, new_source("u1", "cv.pdf", "Ada"), 1000)
            .await
            .unwrap();

        sqlx::query(
            "INSERT INTO knowledge_sources VALUES ('6d1f6a3e-8c4b-4f7e-9a51-1c2d3e4f5a6b', \
             'u1', 'resume', 'bad', '{}', '{\"schema_version\": 99}', 'completed', NULL, \
             '2020-01-01T00:00:00.000000Z', '2020-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = load_sources(&pool, "u1").await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
