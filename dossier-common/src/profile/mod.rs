//! Canonical profile schema
//!
//! A [`PartialProfile`] is what one artifact yields after extraction; its
//! shape is identical for every source type. A [`UnifiedProfile`] is the
//! merge of all of a user's partial profiles plus the list of sources it was
//! built from.
//!
//! Both types are versioned through `schema_version` and checked with
//! `validate()` at every store/service boundary.

pub mod dates;
pub mod records;
mod validate;

pub use dates::{range_is_ordered, EntryDate, PartialDate};
pub use records::{
    CertificationEntry, EducationEntry, ExperienceEntry, ProjectEntry, RecordEntry,
};
pub use validate::SchemaError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use records::nullable_vec;

/// Current profile schema version
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Kind of ingested artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Resume,
    Linkedin,
    Github,
    PersonalWebsite,
    ProjectDocument,
    Portfolio,
    OtherDocument,
    ManualText,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Resume,
        SourceType::Linkedin,
        SourceType::Github,
        SourceType::PersonalWebsite,
        SourceType::ProjectDocument,
        SourceType::Portfolio,
        SourceType::OtherDocument,
        SourceType::ManualText,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Resume => "resume",
            SourceType::Linkedin => "linkedin",
            SourceType::Github => "github",
            SourceType::PersonalWebsite => "personal_website",
            SourceType::ProjectDocument => "project_document",
            SourceType::Portfolio => "portfolio",
            SourceType::OtherDocument => "other_document",
            SourceType::ManualText => "manual_text",
        }
    }

    /// Sources fetched from a third-party network-data provider
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SourceType::Linkedin | SourceType::Github | SourceType::PersonalWebsite
        )
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| SchemaError::new("source_type", format!("unknown source type '{}'", s)))
    }
}

/// Processing status of a stored KnowledgeSource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(SchemaError::new(
                "processing_status",
                format!("unknown processing status '{}'", other),
            )),
        }
    }
}

/// Normalized extraction result from one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialProfile {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    // Identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    // Narrative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,

    // Tag lists
    #[serde(default, deserialize_with = "nullable_vec")]
    pub skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub technical_skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub soft_skills: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub languages: Vec<String>,

    // Record lists
    #[serde(default, deserialize_with = "nullable_vec")]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub education: Vec<EducationEntry>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub certifications: Vec<CertificationEntry>,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub projects: Vec<ProjectEntry>,

    // Links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,
}

impl Default for PartialProfile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: None,
            email: None,
            phone: None,
            location: None,
            summary: None,
            about: None,
            skills: Vec::new(),
            technical_skills: Vec::new(),
            soft_skills: Vec::new(),
            interests: Vec::new(),
            languages: Vec::new(),
            experience: Vec::new(),
            education: Vec::new(),
            certifications: Vec::new(),
            projects: Vec::new(),
            linkedin_url: None,
            github_url: None,
            website_url: None,
            portfolio_url: None,
        }
    }
}

/// Scalar field names in schema order
pub const SCALAR_FIELDS: [&str; 10] = [
    "name",
    "email",
    "phone",
    "location",
    "summary",
    "about",
    "linkedin_url",
    "github_url",
    "website_url",
    "portfolio_url",
];

/// Tag-list field names in schema order
pub const TAG_FIELDS: [&str; 5] = [
    "skills",
    "technical_skills",
    "soft_skills",
    "interests",
    "languages",
];

impl PartialProfile {
    /// Borrow a scalar field by name.
    pub fn scalar(&self, field: &str) -> Option<&str> {
        match field {
            "name" => self.name.as_deref(),
            "email" => self.email.as_deref(),
            "phone" => self.phone.as_deref(),
            "location" => self.location.as_deref(),
            "summary" => self.summary.as_deref(),
            "about" => self.about.as_deref(),
            "linkedin_url" => self.linkedin_url.as_deref(),
            "github_url" => self.github_url.as_deref(),
            "website_url" => self.website_url.as_deref(),
            "portfolio_url" => self.portfolio_url.as_deref(),
            _ => None,
        }
    }

    /// Mutable access to a scalar field by name.
    pub fn scalar_mut(&mut self, field: &str) -> Option<&mut Option<String>> {
        match field {
            "name" => Some(&mut self.name),
            "email" => Some(&mut self.email),
            "phone" => Some(&mut self.phone),
            "location" => Some(&mut self.location),
            "summary" => Some(&mut self.summary),
            "about" => Some(&mut self.about),
            "linkedin_url" => Some(&mut self.linkedin_url),
            "github_url" => Some(&mut self.github_url),
            "website_url" => Some(&mut self.website_url),
            "portfolio_url" => Some(&mut self.portfolio_url),
            _ => None,
        }
    }

    /// Borrow a tag list by name.
    pub fn tags(&self, field: &str) -> &[String] {
        match field {
            "skills" => &self.skills,
            "technical_skills" => &self.technical_skills,
            "soft_skills" => &self.soft_skills,
            "interests" => &self.interests,
            "languages" => &self.languages,
            _ => &[],
        }
    }

    /// Mutable access to a tag list by name.
    pub fn tags_mut(&mut self, field: &str) -> Option<&mut Vec<String>> {
        match field {
            "skills" => Some(&mut self.skills),
            "technical_skills" => Some(&mut self.technical_skills),
            "soft_skills" => Some(&mut self.soft_skills),
            "interests" => Some(&mut self.interests),
            "languages" => Some(&mut self.languages),
            _ => None,
        }
    }

    /// True when nothing at all was extracted.
    pub fn is_empty(&self) -> bool {
        SCALAR_FIELDS.iter().all(|f| self.scalar(f).is_none())
            && TAG_FIELDS.iter().all(|f| self.tags(f).is_empty())
            && self.experience.is_empty()
            && self.education.is_empty()
            && self.certifications.is_empty()
            && self.projects.is_empty()
    }

    /// Stamp every record that has no provenance tag with `source`.
    pub fn stamp_provenance(&mut self, source: &str) {
        fn stamp<R: RecordEntry>(entries: &mut [R], source: &str) {
            for entry in entries.iter_mut().filter(|e| e.source().trim().is_empty()) {
                entry.set_source(source.to_string());
            }
        }
        stamp(&mut self.experience, source);
        stamp(&mut self.education, source);
        stamp(&mut self.certifications, source);
        stamp(&mut self.projects, source);
    }

    /// Flat deduplicated skill index (skills ∪ technical_skills ∪ soft_skills).
    ///
    /// First spelling wins; comparison is case- and whitespace-insensitive.
    pub fn skill_index(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.skills
            .iter()
            .chain(&self.technical_skills)
            .chain(&self.soft_skills)
            .filter(|s| seen.insert(crate::normalize::normalize_key(s)))
            .cloned()
            .collect()
    }
}

/// One source that contributed to a unified profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
}

/// Single merged profile per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedProfile {
    #[serde(flatten)]
    pub profile: PartialProfile,
    pub sources: Vec<SourceRef>,
    /// Flat deduplicated skill index, recomputed on every aggregation
    #[serde(default, deserialize_with = "nullable_vec")]
    pub skill_index: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl UnifiedProfile {
    /// Content equality ignoring `updated_at`.
    pub fn same_content(&self, other: &UnifiedProfile) -> bool {
        self.profile == other.profile
            && self.sources == other.sources
            && self.skill_index == other.skill_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_roundtrip_names() {
        for t in SourceType::ALL {
            assert_eq!(t.as_str().parse::<SourceType>().unwrap(), t);
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        assert!("myspace".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_partial_profile_sparse_document() {
        let p: PartialProfile = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(p.schema_version, SCHEMA_VERSION);
        assert_eq!(p.name.as_deref(), Some("Ada"));
        assert!(p.skills.is_empty());
        assert!(!p.is_empty());
        assert!(PartialProfile::default().is_empty());
    }

    #[test]
    fn test_partial_profile_null_lists() {
        let p: PartialProfile =
            serde_json::from_str(r#"{"skills": null, "experience": null}"#).unwrap();
        assert!(p.skills.is_empty());
        assert!(p.experience.is_empty());
    }

    #[test]
    fn test_stamp_provenance_keeps_existing_tags() {
        let mut p = PartialProfile::default();
        p.experience.push(ExperienceEntry {
            company: Some("A".into()),
            ..Default::default()
        });
        p.projects.push(ProjectEntry {
            name: Some("B".into()),
            source: "github".into(),
            ..Default::default()
        });
        p.stamp_provenance("resume");
        assert_eq!(p.experience[0].source, "resume");
        assert_eq!(p.projects[0].source, "github");
    }

    #[test]
    fn test_skill_index_dedup() {
        let p = PartialProfile {
            skills: vec!["Python".into(), "communication".into()],
            technical_skills: vec!["python".into(), "Rust".into()],
            soft_skills: vec!["Communication".into(), "Leadership".into()],
            ..Default::default()
        };
        assert_eq!(p.skill_index(), vec!["Python", "communication", "Rust", "Leadership"]);
    }

    #[test]
    fn test_unified_profile_flattened_shape() {
        let unified = UnifiedProfile {
            profile: PartialProfile {
                name: Some("Ada".into()),
                ..Default::default()
            },
            sources: vec![SourceRef {
                source_type: SourceType::Resume,
                identifier: "cv.pdf".into(),
                created_at: Utc::now(),
            }],
            skill_index: vec![],
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&unified).unwrap();
        assert_eq!(value["name"], "Ada");
        assert_eq!(value["sources"][0]["type"], "resume");
        assert!(value.get("profile").is_none());

        let back: UnifiedProfile = serde_json::from_value(value).unwrap();
        assert!(back.same_content(&unified));
    }
}
