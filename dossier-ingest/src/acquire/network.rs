//! Remote profile snapshots from a network-data provider
//!
//! The provider is called with the profile identifier taken from the
//! user-supplied URL. Any non-success response is fatal, and so is a
//! payload that is not a non-empty JSON array.

use async_trait::async_trait;
use dossier_common::config::NetworkConfig;
use dossier_common::profile::SourceType;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::{AcquiredInput, NetworkRequest};
use crate::error::PipelineError;
use crate::pipeline::PipelineSession;

/// Network provider errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network provider not configured: {0}")]
    NotConfigured(String),

    #[error("source type '{0}' is not a network profile")]
    UnsupportedSource(SourceType),

    #[error("could not derive a profile identifier from '{0}'")]
    BadUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider returned an empty profile")]
    Empty,
}

/// Third-party network-data provider
#[async_trait]
pub trait NetworkProfileProvider: Send + Sync {
    /// Fetch the raw profile snapshot for `identifier`.
    async fn fetch_profile(
        &self,
        source_type: SourceType,
        identifier: &str,
    ) -> Result<Value, NetworkError>;
}

/// Provider path segment for a network source type
fn provider_path(source_type: SourceType) -> Result<&'static str, NetworkError> {
    match source_type {
        SourceType::Linkedin => Ok("linkedin"),
        SourceType::Github => Ok("github"),
        SourceType::PersonalWebsite => Ok("website"),
        other => Err(NetworkError::UnsupportedSource(other)),
    }
}

/// Profile identifier for the provider.
///
/// LinkedIn: the segment after `/in/`. GitHub: the first path segment.
/// Personal websites: the whole URL. A bare value without `/` is taken as
/// the identifier itself.
pub fn profile_identifier(source_type: SourceType, url: &str) -> Result<String, NetworkError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(NetworkError::BadUrl(url.to_string()));
    }
    if source_type == SourceType::PersonalWebsite {
        return Ok(url.to_string());
    }
    if !url.contains('/') {
        return Ok(url.to_string());
    }

    let absolute = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    let parsed = Url::parse(&absolute).map_err(|_| NetworkError::BadUrl(url.to_string()))?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let candidate = match source_type {
        SourceType::Linkedin => segments
            .iter()
            .position(|s| *s == "in")
            .and_then(|i| segments.get(i + 1)),
        _ => segments.first(),
    };

    candidate
        .map(|s| s.to_string())
        .ok_or_else(|| NetworkError::BadUrl(url.to_string()))
}

/// Provider payload must be a non-empty array.
pub fn ensure_non_empty(payload: &Value) -> Result<(), NetworkError> {
    match payload {
        Value::Array(items) if !items.is_empty() => Ok(()),
        _ => Err(NetworkError::Empty),
    }
}

/// HTTP provider client
pub struct HttpNetworkProvider {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpNetworkProvider {
    pub fn new(config: &NetworkConfig) -> Result<Self, NetworkError> {
        Ok(Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl NetworkProfileProvider for HttpNetworkProvider {
    async fn fetch_profile(
        &self,
        source_type: SourceType,
        identifier: &str,
    ) -> Result<Value, NetworkError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NetworkError::NotConfigured("API key not set".to_string()))?;
        let url = format!("{}/{}/profile", self.base_url, provider_path(source_type)?);

        debug!(%url, identifier, "Fetching network profile");

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", api_key), ("id", identifier)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

/// Fetch a remote profile snapshot.
pub async fn acquire_network(
    provider: &dyn NetworkProfileProvider,
    request: NetworkRequest,
    session: &mut PipelineSession,
) -> Result<AcquiredInput, PipelineError> {
    let acquisition = |e: NetworkError| PipelineError::Acquisition(e.to_string());

    let identifier = profile_identifier(request.source_type, &request.url).map_err(acquisition)?;
    session
        .status(
            "fetching_profile",
            format!("Fetching {} profile '{}'", request.source_type, identifier),
        )
        .await?;

    let payload = provider
        .fetch_profile(request.source_type, &identifier)
        .await
        .map_err(acquisition)?;
    ensure_non_empty(&payload).map_err(acquisition)?;

    info!(
        session_id = %session.id(),
        source_type = %request.source_type,
        identifier = %identifier,
        "Network profile fetched"
    );

    let text = serde_json::to_string_pretty(&payload)
        .map_err(|e| PipelineError::Acquisition(e.to_string()))?;

    Ok(AcquiredInput {
        source_identifier: request.url,
        raw_content: payload,
        text,
    })
}
