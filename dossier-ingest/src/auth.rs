//! Bearer-credential identity collaborator

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use dossier_common::config::{AuthConfig, AuthMode};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::PipelineError;

/// User resolved from a bearer credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Resolves bearer credentials to users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, PipelineError>;
}

/// Bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the request's credential, or fail with an auth error.
pub async fn authenticate_headers(
    identity: &dyn IdentityProvider,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, PipelineError> {
    let token = bearer_token(headers)
        .ok_or_else(|| PipelineError::Auth("missing bearer token".to_string()))?;
    identity.authenticate(token).await
}

/// Fixed token table from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticTokenIdentity {
    tokens: HashMap<String, String>,
}

impl StaticTokenIdentity {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, PipelineError> {
        self.tokens
            .get(token)
            .map(|user_id| AuthenticatedUser {
                user_id: user_id.clone(),
            })
            .ok_or_else(|| PipelineError::Auth("invalid bearer token".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: Option<String>,
    sub: Option<String>,
}

/// User-info endpoint of an external identity provider
pub struct RemoteIdentity {
    http_client: Client,
    userinfo_url: String,
    api_key: Option<String>,
}

impl RemoteIdentity {
    pub fn new(userinfo_url: impl Into<String>, api_key: Option<String>) -> Result<Self, PipelineError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::Auth(format!("identity client: {}", e)))?;
        Ok(Self {
            http_client,
            userinfo_url: userinfo_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentity {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, PipelineError> {
        let mut request = self.http_client.get(&self.userinfo_url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Auth(format!("identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Identity provider rejected token");
            return Err(PipelineError::Auth("invalid bearer token".to_string()));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| PipelineError::Auth(format!("malformed user info: {}", e)))?;

        info.id
            .or(info.sub)
            .filter(|id| !id.trim().is_empty())
            .map(|user_id| AuthenticatedUser { user_id })
            .ok_or_else(|| PipelineError::Auth("user info carries no user id".to_string()))
    }
}

/// Identity provider selected by configuration.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn IdentityProvider>, PipelineError> {
    match config.mode {
        AuthMode::Static => Ok(Arc::new(StaticTokenIdentity::new(config.tokens.clone()))),
        AuthMode::Remote => {
            let url = config
                .userinfo_url
                .clone()
                .ok_or_else(|| PipelineError::Auth("userinfo_url not configured".to_string()))?;
            Ok(Arc::new(RemoteIdentity::new(url, config.api_key.clone())?))
        }
    }
}
