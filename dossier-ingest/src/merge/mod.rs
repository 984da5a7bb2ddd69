//! Multi-source profile merge
//!
//! Inputs are the user's partial profiles ordered most recent first.
//!
//! - Scalars: most complete (longest) value; ties go to the most recent source
//! - Tag lists: union deduplicated by normalized key, canonical spelling preferred
//! - Records: grouped by identity key, fields resolved per group, sorted by recency
//!
//! The rule merge always runs and yields the baseline. A [`MergeResolver`]
//! then produces the streamed merge result, which is parsed, validated and
//! reconciled against the baseline so that no field that some source filled
//! ends up empty.

pub mod canonical;
pub mod fields;
pub mod records;
pub mod resolver;

use chrono::Utc;
use dossier_common::profile::{
    PartialProfile, UnifiedProfile, SCALAR_FIELDS, SCHEMA_VERSION, TAG_FIELDS,
};
use tracing::debug;

pub use canonical::CanonicalSkills;
pub use records::{merge_records, sort_records, MergeRecord};
pub use resolver::{MergeResolver, RuleResolver, ServiceResolver};

use crate::models::KnowledgeSource;
use fields::{pick_text, union_tags};

/// Tag lists that go through the canonical skill table
const SKILL_FIELDS: [&str; 3] = ["skills", "technical_skills", "soft_skills"];

/// Deterministic rule merge
#[derive(Debug, Clone, Default)]
pub struct ProfileMerger {
    canonical: CanonicalSkills,
}

impl ProfileMerger {
    pub fn new(canonical: CanonicalSkills) -> Self {
        Self { canonical }
    }

    pub fn canonical(&self) -> &CanonicalSkills {
        &self.canonical
    }

    fn table_for(&self, field: &str) -> CanonicalSkills {
        if SKILL_FIELDS.contains(&field) {
            self.canonical.clone()
        } else {
            CanonicalSkills::none()
        }
    }

    /// Merge partial profiles given most recent first.
    pub fn merge(&self, profiles: &[&PartialProfile]) -> PartialProfile {
        let mut merged = PartialProfile::default();

        for field in SCALAR_FIELDS {
            let value = pick_text(profiles.iter().map(|p| p.scalar(field)));
            if let Some(slot) = merged.scalar_mut(field) {
                *slot = value;
            }
        }

        for field in TAG_FIELDS {
            let table = self.table_for(field);
            let value = union_tags(profiles.iter().map(|p| p.tags(field)), &table);
            if let Some(slot) = merged.tags_mut(field) {
                *slot = value;
            }
        }

        let experience: Vec<_> = profiles.iter().map(|p| p.experience.as_slice()).collect();
        merged.experience = merge_records(&experience, &self.canonical);
        let education: Vec<_> = profiles.iter().map(|p| p.education.as_slice()).collect();
        merged.education = merge_records(&education, &self.canonical);
        let certifications: Vec<_> = profiles
            .iter()
            .map(|p| p.certifications.as_slice())
            .collect();
        merged.certifications = merge_records(&certifications, &self.canonical);
        let projects: Vec<_> = profiles.iter().map(|p| p.projects.as_slice()).collect();
        merged.projects = merge_records(&projects, &self.canonical);

        debug!(
            sources = profiles.len(),
            experience = merged.experience.len(),
            education = merged.education.len(),
            certifications = merged.certifications.len(),
            projects = merged.projects.len(),
            "Rule merge complete"
        );

        merged
    }

    /// Rule merge over stored sources (already ordered most recent first).
    pub fn baseline(&self, sources: &[KnowledgeSource]) -> PartialProfile {
        let profiles: Vec<&PartialProfile> = sources
            .iter()
            .filter_map(|s| s.parsed_data.as_ref())
            .collect();
        self.merge(&profiles)
    }

    /// Fill gaps in a resolver's result from the baseline and normalize it.
    ///
    /// A field left empty by the resolver takes the baseline value; lists the
    /// resolver did fill are re-deduplicated and records re-sorted.
    pub fn reconcile(&self, resolved: PartialProfile, baseline: &PartialProfile) -> PartialProfile {
        let mut out = resolved;
        out.schema_version = SCHEMA_VERSION;

        for field in SCALAR_FIELDS {
            if let Some(slot) = out.scalar_mut(field) {
                if slot.is_none() {
                    *slot = baseline.scalar(field).map(str::to_string);
                }
            }
        }

        for field in TAG_FIELDS {
            let table = self.table_for(field);
            let current = out.tags(field).to_vec();
            let value = if current.is_empty() {
                baseline.tags(field).to_vec()
            } else {
                union_tags([current.as_slice()], &table)
            };
            if let Some(slot) = out.tags_mut(field) {
                *slot = value;
            }
        }

        out.experience = reconcile_records(&out.experience, &baseline.experience, &self.canonical);
        out.education = reconcile_records(&out.education, &baseline.education, &self.canonical);
        out.certifications =
            reconcile_records(&out.certifications, &baseline.certifications, &self.canonical);
        out.projects = reconcile_records(&out.projects, &baseline.projects, &self.canonical);

        out
    }

    /// Build the unified profile from a reconciled body.
    pub fn finalize(&self, body: PartialProfile, sources: &[KnowledgeSource]) -> UnifiedProfile {
        let skill_index = union_tags(
            SKILL_FIELDS.iter().map(|f| body.tags(f)),
            &self.canonical,
        );
        UnifiedProfile {
            sources: sources.iter().map(KnowledgeSource::source_ref).collect(),
            skill_index,
            updated_at: Utc::now(),
            profile: body,
        }
    }
}

fn reconcile_records<R: MergeRecord>(
    resolved: &[R],
    baseline: &[R],
    canonical: &CanonicalSkills,
) -> Vec<R> {
    if resolved.is_empty() {
        baseline.to_vec()
    } else {
        merge_records(&[resolved], canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_common::profile::{CertificationEntry, EntryDate, ExperienceEntry, PartialDate};

    fn profile_a() -> PartialProfile {
        PartialProfile {
            name: Some("Ada".into()),
            summary: Some("Engineer".into()),
            skills: vec!["Python".into(), "communication".into()],
            ..Default::default()
        }
    }

    fn profile_b() -> PartialProfile {
        PartialProfile {
            name: Some("Ada Lovelace".into()),
            email: Some("ada@example.com".into()),
            skills: vec!["python".into(), "Leadership".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_scalar_and_tag_rules() {
        let merger = ProfileMerger::default();
        let (a, b) = (profile_a(), profile_b());
        let merged = merger.merge(&[&a, &b]);

        assert_eq!(merged.name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(merged.email.as_deref(), Some("ada@example.com"));
        assert_eq!(merged.summary.as_deref(), Some("Engineer"));
        assert_eq!(merged.skills, vec!["Python", "communication", "Leadership"]);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let merger = ProfileMerger::default();
        let (a, b) = (profile_a(), profile_b());
        assert_eq!(merger.merge(&[&a, &b]), merger.merge(&[&a, &b]));
    }

    #[test]
    fn test_reconcile_backfills_empty_fields() {
        let merger = ProfileMerger::default();
        let (a, b) = (profile_a(), profile_b());
        let baseline = merger.merge(&[&a, &b]);

        let resolved = PartialProfile {
            name: Some("Ada Lovelace".into()),
            skills: vec!["Python".into(), "python".into()],
            ..Default::default()
        };
        let out = merger.reconcile(resolved, &baseline);
        assert_eq!(out.email.as_deref(), Some("ada@example.com"));
        assert_eq!(out.summary.as_deref(), Some("Engineer"));
        assert_eq!(out.skills, vec!["Python"]);
    }

    #[test]
    fn test_reconcile_of_baseline_is_identity() {
        let merger = ProfileMerger::default();
        let mut a = profile_a();
        a.experience.push(ExperienceEntry {
            job_title: Some("Engineer".into()),
            company: Some("Acme".into()),
            start_date: Some(EntryDate::Date(PartialDate::year(2020))),
            source: "resume".into(),
            ..Default::default()
        });
        let b = profile_b();
        let baseline = merger.merge(&[&a, &b]);
        assert_eq!(merger.reconcile(baseline.clone(), &baseline), baseline);
    }

    #[test]
    fn test_finalize_computes_skill_index() {
        let merger = ProfileMerger::default();
        let body = PartialProfile {
            skills: vec!["Python".into()],
            technical_skills: vec!["python".into(), "Rust".into()],
            soft_skills: vec!["Leadership".into()],
            ..Default::default()
        };
        let unified = merger.finalize(body, &[]);
        assert_eq!(unified.skill_index, vec!["Python", "Rust", "Leadership"]);
        assert!(unified.sources.is_empty());
    }

    #[test]
    fn test_merged_date_ranges_stay_valid() {
        let year = |y| Some(EntryDate::Date(PartialDate::year(y)));
        let recent = PartialProfile {
            experience: vec![ExperienceEntry {
                job_title: Some("Engineer".into()),
                company: Some("Acme".into()),
                start_date: year(2022),
                source: "linkedin".into(),
                ..Default::default()
            }],
            certifications: vec![CertificationEntry {
                name: Some("CKA".into()),
                issuer: Some("CNCF".into()),
                issue_date: year(2024),
                source: "linkedin".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let older = PartialProfile {
            experience: vec![ExperienceEntry {
                job_title: Some("engineer".into()),
                company: Some("ACME".into()),
                start_date: year(2018),
                end_date: year(2020),
                source: "resume".into(),
                ..Default::default()
            }],
            certifications: vec![CertificationEntry {
                name: Some("CKA".into()),
                issuer: Some("CNCF".into()),
                issue_date: year(2020),
                expiry_date: year(2023),
                source: "resume".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        recent.validate().unwrap();
        older.validate().unwrap();

        let merged = ProfileMerger::default().merge(&[&recent, &older]);

        merged.validate().unwrap();
        assert_eq!(merged.experience.len(), 1);
        assert_eq!(merged.experience[0].start_date, year(2022));
        assert_eq!(merged.experience[0].end_date, None);
        assert_eq!(merged.experience[0].source, "linkedin,resume");
        assert_eq!(merged.certifications.len(), 1);
        assert_eq!(merged.certifications[0].issue_date, year(2024));
        assert_eq!(merged.certifications[0].expiry_date, None);
    }
}
