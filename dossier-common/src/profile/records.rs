//! Record entries: experience, education, certifications, projects

use serde::{Deserialize, Deserializer, Serialize};

use super::dates::{lenient_date, EntryDate};
use crate::normalize::normalize_opt;

/// Deserialize a list that the producer may have written as `null`.
pub fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Common view over the four record kinds, used by merge and validation.
pub trait RecordEntry: Clone {
    /// Record kind name for diagnostics ("experience", "education", ...)
    const KIND: &'static str;

    /// Normalized identity key; two entries with equal keys describe the
    /// same real-world item.
    fn identity_key(&self) -> Vec<String>;

    fn start_date(&self) -> Option<EntryDate>;

    fn end_date(&self) -> Option<EntryDate>;

    /// Entry is ongoing: an explicit current flag or an end date of `Present`.
    fn is_open_ended(&self) -> bool {
        self.end_date().is_some_and(|d| d.is_present())
    }

    fn source(&self) -> &str;

    fn set_source(&mut self, source: String);

    /// True when every identity-key component is empty.
    fn has_empty_identity(&self) -> bool {
        self.identity_key().iter().all(|part| part.is_empty())
    }
}

/// Work history entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<EntryDate>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<EntryDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
    /// Provenance tag (source type the entry was extracted from)
    #[serde(default)]
    pub source: String,
}

impl RecordEntry for ExperienceEntry {
    const KIND: &'static str = "experience";

    fn identity_key(&self) -> Vec<String> {
        vec![
            normalize_opt(self.job_title.as_deref()),
            normalize_opt(self.company.as_deref()),
        ]
    }

    fn start_date(&self) -> Option<EntryDate> {
        self.start_date
    }

    fn end_date(&self) -> Option<EntryDate> {
        self.end_date
    }

    fn is_open_ended(&self) -> bool {
        self.is_current == Some(true) || self.end_date.is_some_and(|d| d.is_present())
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, source: String) {
        self.source = source;
    }
}

/// Education entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<EntryDate>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<EntryDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl RecordEntry for EducationEntry {
    const KIND: &'static str = "education";

    fn identity_key(&self) -> Vec<String> {
        vec![
            normalize_opt(self.degree.as_deref()),
            normalize_opt(self.institution.as_deref()),
        ]
    }

    fn start_date(&self) -> Option<EntryDate> {
        self.start_date
    }

    fn end_date(&self) -> Option<EntryDate> {
        self.end_date
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, source: String) {
        self.source = source;
    }
}

/// Certification entry.
///
/// Certifications have no tenure: `issue_date` acts as both start and end
/// for ordering, and an entry is never open-ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertificationEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<EntryDate>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<EntryDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl RecordEntry for CertificationEntry {
    const KIND: &'static str = "certifications";

    fn identity_key(&self) -> Vec<String> {
        vec![
            normalize_opt(self.name.as_deref()),
            normalize_opt(self.issuer.as_deref()),
        ]
    }

    fn start_date(&self) -> Option<EntryDate> {
        self.issue_date
    }

    fn end_date(&self) -> Option<EntryDate> {
        self.issue_date
    }

    fn is_open_ended(&self) -> bool {
        false
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, source: String) {
        self.source = source;
    }
}

/// Project entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable_vec", skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<EntryDate>,
    #[serde(default, deserialize_with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<EntryDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(default)]
    pub source: String,
}

impl RecordEntry for ProjectEntry {
    const KIND: &'static str = "projects";

    fn identity_key(&self) -> Vec<String> {
        vec![normalize_opt(self.name.as_deref())]
    }

    fn start_date(&self) -> Option<EntryDate> {
        self.start_date
    }

    fn end_date(&self) -> Option<EntryDate> {
        self.end_date
    }

    fn is_open_ended(&self) -> bool {
        self.is_current == Some(true) || self.end_date.is_some_and(|d| d.is_present())
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn set_source(&mut self, source: String) {
        self.source = source;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::dates::PartialDate;

    #[test]
    fn test_experience_identity_key_normalized() {
        let a = ExperienceEntry {
            job_title: Some("Software  Engineer".into()),
            company: Some("ACME Corp".into()),
            ..Default::default()
        };
        let b = ExperienceEntry {
            job_title: Some("software engineer".into()),
            company: Some(" acme corp ".into()),
            ..Default::default()
        };
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn test_open_ended_detection() {
        let mut e = ExperienceEntry::default();
        assert!(!e.is_open_ended());
        e.end_date = Some(EntryDate::Present);
        assert!(e.is_open_ended());
        e.end_date = Some(EntryDate::Date(PartialDate::year(2020)));
        e.is_current = Some(true);
        assert!(e.is_open_ended());
    }

    #[test]
    fn test_deserialize_tolerates_nulls() {
        let json = r#"{
            "job_title": "Engineer",
            "company": null,
            "start_date": "Jan 2020",
            "end_date": "Present",
            "highlights": null
        }"#;
        let e: ExperienceEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.company, None);
        assert_eq!(e.start_date, Some(EntryDate::Date(PartialDate::year_month(2020, 1))));
        assert_eq!(e.end_date, Some(EntryDate::Present));
        assert!(e.highlights.is_empty());
        assert_eq!(e.source, "");
    }

    #[test]
    fn test_empty_identity() {
        let p = ProjectEntry::default();
        assert!(p.has_empty_identity());
        let p = ProjectEntry {
            name: Some("dossier".into()),
            ..Default::default()
        };
        assert!(!p.has_empty_identity());
    }

    #[test]
    fn test_certification_never_open_ended() {
        let c = CertificationEntry {
            name: Some("CKA".into()),
            expiry_date: Some(EntryDate::Present),
            ..Default::default()
        };
        assert!(!c.is_open_ended());
    }
}
