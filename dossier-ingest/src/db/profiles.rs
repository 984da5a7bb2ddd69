//! Unified profile persistence (one row per user)

use dossier_common::profile::{PartialProfile, SourceRef, UnifiedProfile};
use dossier_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use super::retry::retry_on_lock;
use super::sources::{format_timestamp, parse_timestamp};

/// Whether an upsert created the row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Insert or replace the user's unified profile.
///
/// `created_at` of an existing row is kept; everything else is replaced.
pub async fn upsert_profile(
    pool: &SqlitePool,
    user_id: &str,
    unified: &UnifiedProfile,
    max_wait_ms: u64,
) -> Result<UpsertOutcome> {
    unified.validate()?;

    let profile = serde_json::to_string(&unified.profile)?;
    let skill_index = serde_json::to_string(&unified.skill_index)?;
    let sources = serde_json::to_string(&unified.sources)?;
    let schema_version = unified.profile.schema_version as i64;
    let updated_at = format_timestamp(unified.updated_at);

    retry_on_lock("upsert_profile", max_wait_ms, || async {
        let mut tx = pool.begin().await.map_err(Error::Database)?;

        let existed: Option<String> =
            sqlx::query_scalar("SELECT user_id FROM unified_profiles WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO unified_profiles (
                user_id, profile, skill_index, sources, schema_version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                profile = excluded.profile,
                skill_index = excluded.skill_index,
                sources = excluded.sources,
                schema_version = excluded.schema_version,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&profile)
        .bind(&skill_index)
        .bind(&sources)
        .bind(schema_version)
        .bind(&updated_at)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(if existed.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    })
    .await
}

/// Load and re-validate the user's unified profile.
pub async fn load_profile(pool: &SqlitePool, user_id: &str) -> Result<Option<UnifiedProfile>> {
    let row = sqlx::query(
        r#"
        SELECT profile, skill_index, sources, updated_at
        FROM unified_profiles
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let profile: String = row.get("profile");
    let skill_index: String = row.get("skill_index");
    let sources: String = row.get("sources");
    let updated_at: String = row.get("updated_at");

    let unified = UnifiedProfile {
        profile: serde_json::from_str::<PartialProfile>(&profile)?,
        sources: serde_json::from_str::<Vec<SourceRef>>(&sources)?,
        skill_index: serde_json::from_str::<Vec<String>>(&skill_index)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    };
    unified.validate()?;

    Ok(Some(unified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dossier_common::db::init_database;
    use dossier_common::profile::SourceType;
    use tempfile::TempDir;

    fn unified(name: &str) -> UnifiedProfile {
        UnifiedProfile {
            profile: PartialProfile {
                name: Some(name.into()),
                skills: vec!["Rust".into()],
                ..Default::default()
            },
            sources: vec![SourceRef {
                source_type: SourceType::Resume,
                identifier: "cv.pdf".into(),
                created_at: Utc::now(),
            }],
            skill_index: vec!["Rust".into()],
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_user() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.db")).await.unwrap();

        let first = upsert_profile(&pool, "u1", &unified("Ada"), 1000).await.unwrap();
        assert_eq!(first, UpsertOutcome::Created);
        let second = upsert_profile(&pool, "u1", &unified("Ada L."), 1000)
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::Updated);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unified_profiles")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let loaded = load_profile(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.profile.name.as_deref(), Some("Ada L."));
        assert_eq!(loaded.sources.len(), 1);
        assert_eq!(loaded.skill_index, vec!["Rust"]);

        assert!(load_profile(&pool, "u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_profile_not_written() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.db")).await.unwrap();

        let mut bad = unified("Ada");
        bad.sources[0].identifier = "  ".into();
        assert!(upsert_profile(&pool, "u1", &bad, 1000).await.is_err());
        assert!(load_profile(&pool, "u1").await.unwrap().is_none());
    }
}
