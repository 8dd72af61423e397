//! Layered configuration: defaults, then an optional YAML file, then
//! `STUDY_*` environment variables. Command-line flags are applied last by
//! `main`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use services::ai::embeddings::{DEFAULT_DIMENSIONS, DEFAULT_EMBEDDING_MODEL};
use services::ai::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT};
use services::auth_service::DEFAULT_TOKEN_TTL_HOURS;
use services::{EmbeddingConfig, EmbeddingKind, LlmConfig, ServicesConfig};

pub const DEFAULT_DB_URL: &str = "sqlite://study.sqlite3";
pub const DEFAULT_UPLOAD_DIR: &str = "data/uploads";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("a token secret is required (set STUDY_TOKEN_SECRET or token_secret in the config file)")]
    MissingSecret,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub db_url: String,
    pub bind: SocketAddr,
    pub upload_dir: PathBuf,
    pub token_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub log_level: Option<String>,
    pub no_color: bool,
    pub ai: AiSettings,
    pub embeddings: EmbeddingSettings,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiSettings {
    /// Without a key every model-backed feature answers with fallback text.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Seconds one model or embedding request may take before it fails.
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingKind,
    pub model: String,
    pub dimensions: usize,
    /// Embed documents right after upload instead of on request.
    pub embed_on_upload: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            token_secret: None,
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            log_level: None,
            no_color: false,
            ai: AiSettings::default(),
            embeddings: EmbeddingSettings::default(),
        }
    }
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingKind::Hashing,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            embed_on_upload: true,
        }
    }
}

impl AppConfig {
    /// Defaults, the YAML file at `path` if given, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or an
    /// environment variable holds an unusable value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Read` or `ConfigError::Parse`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// # Errors
    ///
    /// Returns the YAML error for malformed input.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Override fields from `STUDY_*` variables looked up through `var`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a value that does not parse.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get("STUDY_DB_URL") {
            self.db_url = value;
        }
        if let Some(value) = get("STUDY_BIND") {
            self.bind = parse("STUDY_BIND", value)?;
        }
        if let Some(value) = get("STUDY_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(value);
        }
        if let Some(value) = get("STUDY_TOKEN_SECRET") {
            self.token_secret = Some(value);
        }
        if let Some(value) = get("STUDY_TOKEN_TTL_HOURS") {
            self.token_ttl_hours = parse("STUDY_TOKEN_TTL_HOURS", value)?;
        }
        if let Some(value) = get("STUDY_AI_API_KEY") {
            self.ai.api_key = Some(value);
        }
        if let Some(value) = get("STUDY_AI_BASE_URL") {
            self.ai.base_url = value;
        }
        if let Some(value) = get("STUDY_AI_MODEL") {
            self.ai.model = value;
        }
        if let Some(value) = get("STUDY_AI_TIMEOUT_SECS") {
            self.ai.timeout_secs = parse("STUDY_AI_TIMEOUT_SECS", value)?;
        }
        if let Some(value) = get("STUDY_EMBEDDING_PROVIDER") {
            self.embeddings.provider = match value.to_lowercase().as_str() {
                "http" => EmbeddingKind::Http,
                "hashing" => EmbeddingKind::Hashing,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STUDY_EMBEDDING_PROVIDER",
                        value,
                    });
                }
            };
        }
        if let Some(value) = get("STUDY_EMBEDDING_MODEL") {
            self.embeddings.model = value;
        }
        if let Some(value) = get("STUDY_EMBEDDING_DIMENSIONS") {
            self.embeddings.dimensions = parse("STUDY_EMBEDDING_DIMENSIONS", value)?;
        }
        Ok(())
    }

    /// Settings handed to the services layer.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingSecret` without a token secret.
    pub fn services_config(&self) -> Result<ServicesConfig, ConfigError> {
        let secret = self
            .token_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let mut services = ServicesConfig::new(secret, self.upload_dir.clone());
        services.token_ttl_hours = self.token_ttl_hours;
        let timeout = Duration::from_secs(self.ai.timeout_secs.max(1));
        services.llm = LlmConfig::from_parts(&self.ai.base_url, self.ai.api_key.as_deref(), &self.ai.model)
            .map(|mut llm| {
                llm.timeout = timeout;
                llm
            });
        services.embeddings = EmbeddingConfig {
            kind: self.embeddings.provider,
            base_url: self.ai.base_url.clone(),
            api_key: self.ai.api_key.clone(),
            model: self.embeddings.model.clone(),
            dimensions: self.embeddings.dimensions,
            timeout,
        };
        services.embed_on_upload = self.embeddings.embed_on_upload;
        Ok(services)
    }
}

fn parse<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { key, value })
}
