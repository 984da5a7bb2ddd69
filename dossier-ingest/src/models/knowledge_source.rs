//! Stored knowledge source model

use chrono::{DateTime, Utc};
use dossier_common::profile::{PartialProfile, ProcessingStatus, SourceRef, SourceType};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One ingested artifact as persisted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeSource {
    pub id: Uuid,
    pub user_id: String,
    pub source_type: SourceType,
    pub source_identifier: String,
    /// Raw acquired content snapshot (opaque)
    pub raw_content: Value,
    pub parsed_data: Option<PartialProfile>,
    pub processing_status: ProcessingStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeSource {
    /// Source reference for the unified profile's `sources` list
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            source_type: self.source_type,
            identifier: self.source_identifier.clone(),
            created_at: self.created_at,
        }
    }
}

/// Fields supplied by a successful ingestion
#[derive(Debug, Clone)]
pub struct NewKnowledgeSource {
    pub user_id: String,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub raw_content: Value,
    pub parsed_data: PartialProfile,
}

/// Listing row for `GET /sources` (no raw content)
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub id: Uuid,
    pub source_type: SourceType,
    pub source_identifier: String,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&KnowledgeSource> for SourceSummary {
    fn from(source: &KnowledgeSource) -> Self {
        Self {
            id: source.id,
            source_type: source.source_type,
            source_identifier: source.source_identifier.clone(),
            processing_status: source.processing_status,
            created_at: source.created_at,
        }
    }
}
