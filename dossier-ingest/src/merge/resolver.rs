//! Merge resolvers
//!
//! A resolver turns the source set plus the rule baseline into a fragment
//! stream with the same contract as single-source extraction: the
//! concatenated fragments are one profile JSON document.

use async_trait::async_trait;
use futures::StreamExt;
use dossier_common::profile::PartialProfile;
use serde::Serialize;
use std::sync::Arc;

use crate::extraction::{
    ExtractionError, ExtractionRequest, ExtractionService, InstructionRole, TokenStream,
};
use crate::models::KnowledgeSource;

/// Produces the streamed merge result
#[async_trait]
pub trait MergeResolver: Send + Sync {
    /// Name reported in `complete` metadata
    fn name(&self) -> &'static str;

    async fn resolve(
        &self,
        sources: &[KnowledgeSource],
        baseline: &PartialProfile,
    ) -> Result<TokenStream, ExtractionError>;
}

/// Emits the rule baseline itself as a single fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleResolver;

#[async_trait]
impl MergeResolver for RuleResolver {
    fn name(&self) -> &'static str {
        "rules"
    }

    async fn resolve(
        &self,
        _sources: &[KnowledgeSource],
        baseline: &PartialProfile,
    ) -> Result<TokenStream, ExtractionError> {
        let document = serde_json::to_string(baseline)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        Ok(futures::stream::once(async move { Ok(document) }).boxed())
    }
}

/// Asks the extraction service to refine the rule baseline.
pub struct ServiceResolver {
    extractor: Arc<dyn ExtractionService>,
}

impl ServiceResolver {
    pub fn new(extractor: Arc<dyn ExtractionService>) -> Self {
        Self { extractor }
    }
}

#[derive(Serialize)]
struct MergeSource<'a> {
    source_type: &'a str,
    identifier: &'a str,
    created_at: String,
    profile: &'a PartialProfile,
}

#[derive(Serialize)]
struct MergeInput<'a> {
    sources: Vec<MergeSource<'a>>,
    baseline: &'a PartialProfile,
}

/// Serialized merge request body (sources most recent first, then baseline).
pub fn merge_request_content(
    sources: &[KnowledgeSource],
    baseline: &PartialProfile,
) -> serde_json::Result<String> {
    let input = MergeInput {
        sources: sources
            .iter()
            .filter_map(|s| {
                Some(MergeSource {
                    source_type: s.source_type.as_str(),
                    identifier: &s.source_identifier,
                    created_at: s.created_at.to_rfc3339(),
                    profile: s.parsed_data.as_ref()?,
                })
            })
            .collect(),
        baseline,
    };
    serde_json::to_string_pretty(&input)
}

#[async_trait]
impl MergeResolver for ServiceResolver {
    fn name(&self) -> &'static str {
        "service"
    }

    async fn resolve(
        &self,
        sources: &[KnowledgeSource],
        baseline: &PartialProfile,
    ) -> Result<TokenStream, ExtractionError> {
        let content = merge_request_content(sources, baseline)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;
        self.extractor
            .stream(ExtractionRequest::new(InstructionRole::MultiSourceMerge, content))
            .await
    }
}
