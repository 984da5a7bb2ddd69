//! Schema checks for profiles
//!
//! Extraction output is untrusted. `sanitize()` tidies what can be tidied
//! without inventing data (trims strings, drops empty values); `validate()`
//! then rejects anything that still does not fit the schema.

use std::fmt;

use super::{
    range_is_ordered, PartialProfile, RecordEntry, UnifiedProfile, SCALAR_FIELDS, SCHEMA_VERSION,
    TAG_FIELDS,
};
use crate::normalize::tidy;

const MAX_TAG_LEN: usize = 120;
const MAX_SCALAR_LEN: usize = 20_000;

/// A schema violation, located by field path (e.g. `experience[2].start_date`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub path: String,
    pub reason: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl std::error::Error for SchemaError {}

fn clean_opt(value: &mut Option<String>) {
    if let Some(v) = value.take() {
        let trimmed = v.trim();
        if !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null") && trimmed != "N/A" {
            *value = Some(trimmed.to_string());
        }
    }
}

fn clean_list(values: &mut Vec<String>) {
    let cleaned = values
        .drain(..)
        .map(|v| tidy(&v))
        .filter(|v| !v.is_empty())
        .collect();
    *values = cleaned;
}

impl PartialProfile {
    /// Trim text, drop empty strings and empty list items.
    pub fn sanitize(&mut self) {
        for field in SCALAR_FIELDS {
            if let Some(slot) = self.scalar_mut(field) {
                clean_opt(slot);
            }
        }
        for field in TAG_FIELDS {
            if let Some(list) = self.tags_mut(field) {
                clean_list(list);
            }
        }

        for e in &mut self.experience {
            clean_opt(&mut e.job_title);
            clean_opt(&mut e.company);
            clean_opt(&mut e.location);
            clean_opt(&mut e.description);
            clean_list(&mut e.highlights);
            e.source = e.source.trim().to_string();
        }
        for e in &mut self.education {
            clean_opt(&mut e.degree);
            clean_opt(&mut e.field_of_study);
            clean_opt(&mut e.institution);
            clean_opt(&mut e.location);
            clean_opt(&mut e.grade);
            clean_opt(&mut e.description);
            e.source = e.source.trim().to_string();
        }
        for c in &mut self.certifications {
            clean_opt(&mut c.name);
            clean_opt(&mut c.issuer);
            clean_opt(&mut c.credential_id);
            clean_opt(&mut c.url);
            clean_opt(&mut c.description);
            c.source = c.source.trim().to_string();
        }
        for p in &mut self.projects {
            clean_opt(&mut p.name);
            clean_opt(&mut p.role);
            clean_opt(&mut p.description);
            clean_opt(&mut p.url);
            clean_list(&mut p.technologies);
            p.source = p.source.trim().to_string();
        }

        self.experience.retain(|e| !e.has_empty_identity());
        self.education.retain(|e| !e.has_empty_identity());
        self.certifications.retain(|e| !e.has_empty_identity());
        self.projects.retain(|e| !e.has_empty_identity());
    }

    /// Check the profile against the schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.schema_version == 0 || self.schema_version > SCHEMA_VERSION {
            return Err(SchemaError::new(
                "schema_version",
                format!(
                    "unsupported version {} (supported: 1..={})",
                    self.schema_version, SCHEMA_VERSION
                ),
            ));
        }

        for field in SCALAR_FIELDS {
            if let Some(value) = self.scalar(field) {
                check_text(field, value, MAX_SCALAR_LEN)?;
            }
        }

        if let Some(email) = &self.email {
            if !email.contains('@') || email.contains(char::is_whitespace) {
                return Err(SchemaError::new("email", "not an email address"));
            }
        }

        for field in ["linkedin_url", "github_url", "website_url", "portfolio_url"] {
            if let Some(url) = self.scalar(field) {
                check_url(field, url)?;
            }
        }

        for field in TAG_FIELDS {
            for (i, tag) in self.tags(field).iter().enumerate() {
                check_text(&format!("{}[{}]", field, i), tag, MAX_TAG_LEN)?;
            }
        }

        validate_records(&self.experience)?;
        validate_records(&self.education)?;
        validate_records(&self.certifications)?;
        validate_records(&self.projects)?;

        Ok(())
    }
}

impl UnifiedProfile {
    pub fn sanitize(&mut self) {
        self.profile.sanitize();
        clean_list(&mut self.skill_index);
    }

    /// Check the merged profile plus its source list.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.profile.validate()?;
        for (i, source) in self.sources.iter().enumerate() {
            if source.identifier.trim().is_empty() {
                return Err(SchemaError::new(
                    format!("sources[{}].identifier", i),
                    "must not be empty",
                ));
            }
        }
        for (i, skill) in self.skill_index.iter().enumerate() {
            check_text(&format!("skill_index[{}]", i), skill, MAX_TAG_LEN)?;
        }
        Ok(())
    }
}

fn check_text(path: &str, value: &str, max_len: usize) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::new(path, "must not be empty"));
    }
    if value.chars().count() > max_len {
        return Err(SchemaError::new(
            path,
            format!("longer than {} characters", max_len),
        ));
    }
    Ok(())
}

fn check_url(path: &str, value: &str) -> Result<(), SchemaError> {
    if value.contains(char::is_whitespace) || !value.contains('.') {
        return Err(SchemaError::new(path, "not a URL"));
    }
    Ok(())
}

fn validate_records<R: RecordEntry>(entries: &[R]) -> Result<(), SchemaError> {
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("{}[{}]", R::KIND, i);
        if entry.has_empty_identity() {
            return Err(SchemaError::new(path, "missing identifying fields"));
        }
        if entry.source().trim().is_empty() {
            return Err(SchemaError::new(
                format!("{}.source", path),
                "missing provenance tag",
            ));
        }
        if !range_is_ordered(entry.start_date(), entry.end_date()) {
            return Err(SchemaError::new(
                format!("{}.end_date", path),
                "ends before it starts",
            ));
        }
    }
    Ok(())
}
