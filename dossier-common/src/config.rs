//! Configuration loading
//!
//! Resolution priority (highest first):
//! 1. Command-line arguments (applied by the binary on top of the result)
//! 2. Environment variables (`DOSSIER_*`)
//! 3. TOML config file
//! 4. Compiled defaults

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5790,
        }
    }
}

/// SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    /// Budget for retrying writes that hit "database is locked"
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("dossier.db"),
            max_connections: 10,
            max_lock_wait_ms: 5000,
        }
    }
}

/// External semantic-extraction service (OpenAI-compatible chat completions)
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub connect_timeout_secs: u64,
    /// Whole-request timeout; `None` leaves a hung stream to the transport
    pub request_timeout_secs: Option<u64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.1,
            connect_timeout_secs: 30,
            request_timeout_secs: None,
        }
    }
}

/// Third-party network-profile provider
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.scrapingdog.com".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// How bearer credentials are resolved to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Token table in configuration
    Static,
    /// User-info endpoint of an identity provider
    Remote,
}

/// Identity collaborator settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Static mode: bearer token → user id
    pub tokens: HashMap<String, String>,
    /// Remote mode: GET endpoint returning `{ "id": ... }` for a valid bearer token
    pub userinfo_url: Option<String>,
    /// Remote mode: API key header some providers require alongside the bearer token
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Static,
            tokens: HashMap::new(),
            userinfo_url: None,
            api_key: None,
        }
    }
}

/// Which resolver decides the multi-source merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeResolverKind {
    /// Deterministic rule engine only
    Rules,
    /// Rule engine baseline refined by the extraction service
    Service,
}

/// Merge engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub resolver: MergeResolverKind,
    /// Extra preferred skill spellings, added to the built-in table
    pub canonical_skills: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            resolver: MergeResolverKind::Rules,
            canonical_skills: Vec::new(),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub extraction: ExtractionConfig,
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub merge: MergeConfig,
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<redacted>"
    } else {
        "<unset>"
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("tokens", &format!("<{} entries>", self.tokens.len()))
            .field("userinfo_url", &self.userinfo_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl ServiceConfig {
    /// Parse a TOML document; missing sections and keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration: TOML file (explicit path or platform default),
    /// then environment overrides on top.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) => {
                    tracing::info!("Loading configuration from {}", path.display());
                    Self::from_file(&path)?
                }
                None => {
                    tracing::info!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Apply `DOSSIER_*` environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DOSSIER_HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("DOSSIER_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = lookup("DOSSIER_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOSSIER_EXTRACTION_BASE_URL") {
            self.extraction.base_url = v;
        }
        if let Some(v) = lookup("DOSSIER_EXTRACTION_MODEL") {
            self.extraction.model = v;
        }
        if let Some(v) = lookup("DOSSIER_EXTRACTION_API_KEY") {
            self.extraction.api_key = Some(v);
        }
        if let Some(v) = lookup("DOSSIER_NETWORK_BASE_URL") {
            self.network.base_url = v;
        }
        if let Some(v) = lookup("DOSSIER_NETWORK_API_KEY") {
            self.network.api_key = Some(v);
        }
        if let Some(v) = lookup("DOSSIER_AUTH_USERINFO_URL") {
            self.auth.mode = AuthMode::Remote;
            self.auth.userinfo_url = Some(v);
        }
        if let Some(v) = lookup("DOSSIER_AUTH_API_KEY") {
            self.auth.api_key = Some(v);
        }
        if let Some(v) = lookup("DOSSIER_MERGE_RESOLVER") {
            match v.as_str() {
                "rules" => self.merge.resolver = MergeResolverKind::Rules,
                "service" => self.merge.resolver = MergeResolverKind::Service,
                other => tracing::warn!("Ignoring unknown DOSSIER_MERGE_RESOLVER '{}'", other),
            }
        }
    }

    /// Reject combinations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.auth.mode == AuthMode::Remote && self.auth.userinfo_url.is_none() {
            return Err(Error::Config(
                "auth.mode = \"remote\" requires auth.userinfo_url".to_string(),
            ));
        }
        if self.extraction.base_url.trim().is_empty() {
            return Err(Error::Config("extraction.base_url must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Platform config file: `$XDG_CONFIG_HOME/dossier/config.toml`, then
/// `/etc/dossier/config.toml` on Linux.
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("dossier").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/dossier/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default data folder
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("dossier"))
        .unwrap_or_else(|| PathBuf::from("./dossier_data"))
}
