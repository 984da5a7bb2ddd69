//! Record-list merging
//!
//! Entries from all sources are grouped by identity key; each group becomes
//! one entry whose fields are resolved independently. Groups with different
//! keys are never combined. The result is ordered most recent first.

use dossier_common::profile::{
    range_is_ordered, CertificationEntry, EducationEntry, EntryDate, ExperienceEntry,
    PartialDate, ProjectEntry, RecordEntry,
};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::canonical::CanonicalSkills;
use super::fields::{join_sources, pick_date_range, pick_flag, pick_text, union_tags};

/// A record kind that knows how to fold a group of duplicates into one entry.
pub trait MergeRecord: RecordEntry {
    /// Fold `group` (most recent source first) into one entry.
    fn merge_group(group: &[&Self], canonical: &CanonicalSkills) -> Self;
}

/// Merge record lists given in source recency order.
pub fn merge_records<R: MergeRecord>(lists: &[&[R]], canonical: &CanonicalSkills) -> Vec<R> {
    let mut order: Vec<Vec<String>> = Vec::new();
    let mut groups: HashMap<Vec<String>, Vec<&R>> = HashMap::new();

    for entry in lists.iter().flat_map(|list| list.iter()) {
        if entry.has_empty_identity() {
            continue;
        }
        let key = entry.identity_key();
        let group = groups.entry(key.clone()).or_default();
        if group.is_empty() {
            order.push(key);
        }
        group.push(entry);
    }

    let mut merged: Vec<R> = order
        .iter()
        .filter_map(|key| groups.get(key))
        .map(|group| merge_checked(group, canonical))
        .collect();
    sort_records(&mut merged);
    merged
}

/// Fold a group, falling back to its most recent member when the folded
/// date range comes out reversed.
fn merge_checked<R: MergeRecord>(group: &[&R], canonical: &CanonicalSkills) -> R {
    let merged = R::merge_group(group, canonical);
    if range_is_ordered(merged.start_date(), merged.end_date()) {
        return merged;
    }
    tracing::warn!(
        kind = R::KIND,
        members = group.len(),
        "Merged record dates out of order, keeping most recent entry"
    );
    let mut fallback = group[0].clone();
    fallback.set_source(merged.source().to_string());
    fallback
}

fn end_rank<R: RecordEntry>(entry: &R) -> (u8, Option<PartialDate>) {
    if entry.is_open_ended() {
        return (2, None);
    }
    match entry.end_date().and_then(|d| d.as_date()) {
        Some(date) => (1, Some(date)),
        None => (0, None),
    }
}

/// Order by recency: open-ended first, then end date descending, ties by
/// start date descending. Entries without any end date go last. Stable.
pub fn sort_records<R: RecordEntry>(entries: &mut [R]) {
    entries.sort_by(|a, b| compare_recency(a, b));
}

fn compare_recency<R: RecordEntry>(a: &R, b: &R) -> Ordering {
    end_rank(b).cmp(&end_rank(a)).then_with(|| {
        let start_a = a.start_date().and_then(|d| d.as_date());
        let start_b = b.start_date().and_then(|d| d.as_date());
        start_b.cmp(&start_a)
    })
}

/// `is_current` must agree with the resolved end date.
fn resolve_current(end_date: Option<EntryDate>, flag: Option<bool>) -> Option<bool> {
    match end_date {
        Some(EntryDate::Present) => Some(true),
        Some(EntryDate::Date(_)) => flag.map(|_| false),
        None => flag,
    }
}

impl MergeRecord for ExperienceEntry {
    fn merge_group(group: &[&Self], _canonical: &CanonicalSkills) -> Self {
        let (start_date, end_date) =
            pick_date_range(group.iter().map(|e| (e.start_date, e.end_date)));
        let highlights: Vec<&[String]> = group.iter().map(|e| e.highlights.as_slice()).collect();
        ExperienceEntry {
            job_title: pick_text(group.iter().map(|e| e.job_title.as_deref())),
            company: pick_text(group.iter().map(|e| e.company.as_deref())),
            location: pick_text(group.iter().map(|e| e.location.as_deref())),
            start_date,
            end_date,
            is_current: resolve_current(end_date, pick_flag(group.iter().map(|e| e.is_current))),
            description: pick_text(group.iter().map(|e| e.description.as_deref())),
            highlights: union_tags(highlights, &CanonicalSkills::none()),
            source: join_sources(group.iter().map(|e| e.source.as_str())),
        }
    }
}

impl MergeRecord for EducationEntry {
    fn merge_group(group: &[&Self], _canonical: &CanonicalSkills) -> Self {
        let (start_date, end_date) =
            pick_date_range(group.iter().map(|e| (e.start_date, e.end_date)));
        EducationEntry {
            degree: pick_text(group.iter().map(|e| e.degree.as_deref())),
            field_of_study: pick_text(group.iter().map(|e| e.field_of_study.as_deref())),
            institution: pick_text(group.iter().map(|e| e.institution.as_deref())),
            location: pick_text(group.iter().map(|e| e.location.as_deref())),
            start_date,
            end_date,
            grade: pick_text(group.iter().map(|e| e.grade.as_deref())),
            description: pick_text(group.iter().map(|e| e.description.as_deref())),
            source: join_sources(group.iter().map(|e| e.source.as_str())),
        }
    }
}

impl MergeRecord for CertificationEntry {
    fn merge_group(group: &[&Self], _canonical: &CanonicalSkills) -> Self {
        let (issue_date, expiry_date) =
            pick_date_range(group.iter().map(|c| (c.issue_date, c.expiry_date)));
        CertificationEntry {
            name: pick_text(group.iter().map(|c| c.name.as_deref())),
            issuer: pick_text(group.iter().map(|c| c.issuer.as_deref())),
            issue_date,
            expiry_date,
            credential_id: pick_text(group.iter().map(|c| c.credential_id.as_deref())),
            url: pick_text(group.iter().map(|c| c.url.as_deref())),
            description: pick_text(group.iter().map(|c| c.description.as_deref())),
            source: join_sources(group.iter().map(|c| c.source.as_str())),
        }
    }
}

impl MergeRecord for ProjectEntry {
    fn merge_group(group: &[&Self], canonical: &CanonicalSkills) -> Self {
        let (start_date, end_date) =
            pick_date_range(group.iter().map(|p| (p.start_date, p.end_date)));
        let technologies: Vec<&[String]> =
            group.iter().map(|p| p.technologies.as_slice()).collect();
        ProjectEntry {
            name: pick_text(group.iter().map(|p| p.name.as_deref())),
            role: pick_text(group.iter().map(|p| p.role.as_deref())),
            description: pick_text(group.iter().map(|p| p.description.as_deref())),
            technologies: union_tags(technologies, canonical),
            url: pick_text(group.iter().map(|p| p.url.as_deref())),
            start_date,
            end_date,
            is_current: resolve_current(end_date, pick_flag(group.iter().map(|p| p.is_current))),
            source: join_sources(group.iter().map(|p| p.source.as_str())),
        }
    }
}
