//! Extraction output parsing
//!
//! The accumulated fragment text must be one JSON object in the profile
//! schema, optionally wrapped in a Markdown code fence.

use dossier_common::profile::{PartialProfile, SourceType};

use crate::error::PipelineError;

/// Remove a leading/trailing Markdown code fence, if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn parse_profile(raw: &str) -> Result<PartialProfile, PipelineError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(PipelineError::Parse("extraction output is empty".to_string()));
    }
    serde_json::from_str::<PartialProfile>(body).map_err(|e| PipelineError::Parse(e.to_string()))
}

/// Parse single-source extraction output.
///
/// Records without a provenance tag are stamped with `source_type`.
pub fn parse_partial_profile(
    raw: &str,
    source_type: SourceType,
) -> Result<PartialProfile, PipelineError> {
    let mut profile = parse_profile(raw)?;
    profile.stamp_provenance(source_type.as_str());
    profile.sanitize();
    profile
        .validate()
        .map_err(|e| PipelineError::Parse(format!("schema violation at {}", e)))?;
    Ok(profile)
}

/// Parse merge output into the profile body.
///
/// `sources`, `skill_index` and `updated_at` keys, if the resolver echoed
/// them, are ignored; the pipeline computes those itself.
pub fn parse_merged_profile(raw: &str) -> Result<PartialProfile, PipelineError> {
    let mut profile = parse_profile(raw)?;
    profile.stamp_provenance("merged");
    profile.sanitize();
    profile
        .validate()
        .map_err(|e| PipelineError::Parse(format!("schema violation at {}", e)))?;
    Ok(profile)
}
