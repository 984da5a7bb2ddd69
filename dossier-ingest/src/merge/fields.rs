//! Field-level selection rules
//!
//! Every function takes candidates in source recency order (most recent
//! first), so "earliest candidate" always means "most recent source".

use dossier_common::normalize::{normalize_key, tidy};
use dossier_common::profile::{range_is_ordered, EntryDate};
use std::collections::HashSet;

use super::canonical::CanonicalSkills;

/// Most complete (longest) value; ties go to the most recent source.
pub fn pick_text<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut best: Option<(&str, usize)> = None;
    for value in candidates.into_iter().flatten() {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let len = value.chars().count();
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((value, len));
        }
    }
    best.map(|(value, _)| value.to_string())
}

/// First flag any source states.
pub fn pick_flag<I>(candidates: I) -> Option<bool>
where
    I: IntoIterator<Item = Option<bool>>,
{
    candidates.into_iter().flatten().next()
}

/// Start and end dates of one record, resolved together.
///
/// The pair comes from the most recent source that dates the record at all.
/// A year-only date is refined to a month stated by another source for the
/// same year, and a missing end of the range is filled from the next source
/// that has one, each only when the range stays ordered.
pub fn pick_date_range<I>(candidates: I) -> (Option<EntryDate>, Option<EntryDate>)
where
    I: IntoIterator<Item = (Option<EntryDate>, Option<EntryDate>)>,
{
    let candidates: Vec<_> = candidates.into_iter().collect();
    let Some((mut start, mut end)) = candidates
        .iter()
        .copied()
        .find(|(start, end)| start.is_some() || end.is_some())
    else {
        return (None, None);
    };

    if start.is_none() {
        if let Some(filled) = candidates
            .iter()
            .filter_map(|(s, _)| *s)
            .find(|s| range_is_ordered(Some(*s), end))
        {
            start = Some(filled);
        }
    }
    if end.is_none() {
        if let Some(filled) = candidates
            .iter()
            .filter_map(|(_, e)| *e)
            .find(|e| range_is_ordered(start, Some(*e)))
        {
            end = Some(filled);
        }
    }

    if let Some(refined) = refine_month(start, candidates.iter().map(|(s, _)| *s)) {
        if range_is_ordered(Some(refined), end) {
            start = Some(refined);
        }
    }
    if let Some(refined) = refine_month(end, candidates.iter().map(|(_, e)| *e)) {
        if range_is_ordered(start, Some(refined)) {
            end = Some(refined);
        }
    }
    (start, end)
}

/// Month-precision spelling of a year-only `date` found among `others`.
fn refine_month<I>(date: Option<EntryDate>, others: I) -> Option<EntryDate>
where
    I: IntoIterator<Item = Option<EntryDate>>,
{
    let date = date?.as_date().filter(|d| !d.has_month())?;
    others.into_iter().flatten().find(|c| {
        c.as_date()
            .is_some_and(|d| d.year == date.year && d.has_month())
    })
}

/// Union of tag lists, deduplicated by normalized key.
///
/// Order is first appearance; the spelling kept is the canonical one when
/// the table has it, else the first spelling seen.
pub fn union_tags<'a, I>(lists: I, canonical: &CanonicalSkills) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for tag in lists.into_iter().flatten() {
        let tag = tidy(tag);
        if tag.is_empty() {
            continue;
        }
        if seen.insert(canonical.key_of(&tag)) {
            let spelling = canonical
                .lookup(&tag)
                .map(str::to_string)
                .unwrap_or(tag);
            merged.push(spelling);
        }
    }
    merged
}

/// Distinct provenance tags joined with ','.
pub fn join_sources<'a, I>(sources: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut parts = Vec::new();
    for source in sources {
        for part in source.split(',') {
            let part = part.trim();
            if !part.is_empty() && seen.insert(normalize_key(part)) {
                parts.push(part);
            }
        }
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_common::profile::PartialDate;

    fn date(y: i32, m: Option<u8>) -> EntryDate {
        EntryDate::Date(PartialDate { year: y, month: m })
    }

    #[test]
    fn test_pick_text_longest_then_recent() {
        assert_eq!(
            pick_text([Some("Eng"), None, Some("Engineer"), Some("Engineer")]),
            Some("Engineer".to_string())
        );
        assert_eq!(pick_text([Some("abc"), Some("xyz")]), Some("abc".to_string()));
        assert_eq!(pick_text([None, Some("  ")]), None);
    }

    #[test]
    fn test_date_range_recent_refined_by_month() {
        assert_eq!(
            pick_date_range([
                (None, None),
                (Some(date(2021, None)), None),
                (Some(date(2021, Some(3))), None),
            ]),
            (Some(date(2021, Some(3))), None)
        );
        assert_eq!(
            pick_date_range([(Some(date(2022, None)), None), (Some(date(2021, Some(3))), None)]),
            (Some(date(2022, None)), None)
        );
        assert_eq!(pick_date_range([(None, None), (None, None)]), (None, None));
    }

    #[test]
    fn test_date_range_taken_from_one_source() {
        // The older source's end date would precede the recent start
        assert_eq!(
            pick_date_range([
                (Some(date(2022, None)), None),
                (Some(date(2018, None)), Some(date(2020, None))),
            ]),
            (Some(date(2022, None)), None)
        );
        assert_eq!(
            pick_date_range([
                (None, Some(EntryDate::Present)),
                (Some(date(2020, Some(1))), Some(date(2021, None))),
            ]),
            (Some(date(2020, Some(1))), Some(EntryDate::Present))
        );
    }

    #[test]
    fn test_date_range_refinement_keeps_order() {
        assert_eq!(
            pick_date_range([
                (Some(date(2020, None)), Some(date(2020, None))),
                (Some(date(2020, Some(11))), None),
                (None, Some(date(2020, Some(3)))),
            ]),
            (Some(date(2020, Some(11))), Some(date(2020, None)))
        );
    }

    #[test]
    fn test_union_tags_dedup_first_spelling() {
        let a = vec!["Python".to_string(), "communication".to_string()];
        let b = vec!["python".to_string(), "Leadership".to_string()];
        let merged = union_tags([a.as_slice(), b.as_slice()], &CanonicalSkills::none());
        assert_eq!(merged, vec!["Python", "communication", "Leadership"]);
    }

    #[test]
    fn test_union_tags_canonical_spelling() {
        let a = vec!["postgres".to_string(), "JS".to_string()];
        let b = vec!["PostgreSQL".to_string(), "javascript".to_string()];
        let merged = union_tags([a.as_slice(), b.as_slice()], &CanonicalSkills::builtin());
        assert_eq!(merged, vec!["PostgreSQL", "JavaScript"]);
    }

    #[test]
    fn test_join_sources() {
        assert_eq!(join_sources(["resume", "linkedin", "resume"]), "resume,linkedin");
        assert_eq!(join_sources(["resume,github", "github", ""]), "resume,github");
    }

    #[test]
    fn test_pick_flag() {
        assert_eq!(pick_flag([None, Some(false), Some(true)]), Some(false));
        assert_eq!(pick_flag([None, None]), None);
    }
}
