//! Pipeline configuration.
//!
//! Defaults, then an optional YAML file named by `CHESS_EXPLAINER_CONFIG`,
//! then `CHESS_EXPLAINER_*` environment variables, in that order of
//! precedence (last wins).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utilities::errors::ConfigError;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_ENV: &str = "CHESS_EXPLAINER_CONFIG";

/// Prefix of per-field override variables.
pub const ENV_PREFIX: &str = "CHESS_EXPLAINER_";

/// Where cached analysis and extractions live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    File,
}

/// Tunables for the explanation pipeline and its server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum validation confidence for accepting a model reading.
    pub acceptance_threshold: f64,
    /// Extraction calls allowed before falling back to ground truth.
    pub max_attempts: u32,
    /// Timeout for each model call.
    pub timeout_secs: u64,
    /// Retries of the final generation call.
    pub generation_retries: u32,
    pub model: String,
    pub api_base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub cache_backend: CacheBackend,
    pub cache_dir: PathBuf,
    /// Cache entry lifetime; `None` keeps entries for the life of the backend.
    pub cache_ttl_secs: Option<u64>,
    /// Reuse validated extractions for positions seen before.
    pub memoize_extractions: bool,
    pub port: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.9,
            max_attempts: 3,
            timeout_secs: 30,
            generation_retries: 1,
            model: "claude-sonnet-4-20250514".to_string(),
            api_base_url: None,
            max_tokens: 1024,
            temperature: None,
            cache_backend: CacheBackend::Memory,
            cache_dir: PathBuf::from(".chess-explainer-cache"),
            cache_ttl_secs: None,
            memoize_extractions: false,
            port: 8080,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML config file.
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load from the process environment and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_yaml_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHESS_EXPLAINER_<FIELD>` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| lookup(&format!("{}{}", ENV_PREFIX, field));

        if let Some(v) = get("ACCEPTANCE_THRESHOLD") {
            self.acceptance_threshold = parse_value("ACCEPTANCE_THRESHOLD", &v)?;
        }
        if let Some(v) = get("MAX_ATTEMPTS") {
            self.max_attempts = parse_value("MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("TIMEOUT_SECS") {
            self.timeout_secs = parse_value("TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("GENERATION_RETRIES") {
            self.generation_retries = parse_value("GENERATION_RETRIES", &v)?;
        }
        if let Some(v) = get("MODEL") {
            self.model = v;
        }
        if let Some(v) = get("API_BASE_URL") {
            self.api_base_url = Some(v);
        }
        if let Some(v) = get("MAX_TOKENS") {
            self.max_tokens = parse_value("MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("TEMPERATURE") {
            self.temperature = Some(parse_value("TEMPERATURE", &v)?);
        }
        if let Some(v) = get("CACHE_BACKEND") {
            self.cache_backend = match v.trim().to_ascii_lowercase().as_str() {
                "memory" => CacheBackend::Memory,
                "file" => CacheBackend::File,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "cache_backend".to_string(),
                        message: format!("expected 'memory' or 'file', got '{}'", other),
                    })
                }
            };
        }
        if let Some(v) = get("CACHE_DIR") {
            self.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            self.cache_ttl_secs = Some(parse_value("CACHE_TTL_SECS", &v)?);
        }
        if let Some(v) = get("MEMOIZE_EXTRACTIONS") {
            self.memoize_extractions = parse_value("MEMOIZE_EXTRACTIONS", &v)?;
        }
        if let Some(v) = get("PORT") {
            self.port = parse_value("PORT", &v)?;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.acceptance_threshold) {
            return Err(invalid(
                "acceptance_threshold",
                format!("must be within [0, 1], got {}", self.acceptance_threshold),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("timeout_secs", "must be greater than zero"));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be greater than zero"));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(invalid("temperature", format!("must be within [0, 1], got {}", t)));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_value<T>(field: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| invalid(&field.to_ascii_lowercase(), format!("'{}': {}", raw, e)))
}
