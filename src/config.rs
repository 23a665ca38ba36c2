//! Configuration for the importer
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! environment variables, then command-line flags (applied by the runner).

use crate::engine::ImportConfig;
use crate::error::{Error, Result};
use crate::http::{RateLimiterConfig, RetryPolicy, SubmitClientConfig};
use crate::state::{CheckpointStore, DEFAULT_CHECKPOINT_PATH};
use crate::validate::{EntityCache, Validator, ValidatorConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API key, required for `import`
pub const ENV_API_KEY: &str = "KNESSET_API_KEY";
/// API base URL, optional
pub const ENV_API_URL: &str = "KNESSET_API_URL";

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete importer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSettings {
    /// API endpoint and credentials
    #[serde(default)]
    pub api: ApiConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Request pacing and quota handling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Batching and on-disk artifacts
    #[serde(default)]
    pub import: BatchConfig,

    /// Validation rules and entity snapshot
    #[serde(default)]
    pub validation: ValidationConfig,
}

// ============================================================================
// API
// ============================================================================

/// API endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL for API requests
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; normally supplied through the environment
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Treat error bodies mentioning "duplicate" as duplicates
    #[serde(default = "default_true")]
    pub duplicate_text_heuristic: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
            duplicate_text_heuristic: default_true(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Rate Limit
// ============================================================================

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether to pace requests client-side
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Server quota per hour
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u32,

    /// Share of the quota kept in reserve
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    /// Pause between batches when fewer requests remain
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: u64,

    /// Longest single wait for a quota reset, in seconds
    #[serde(default = "default_max_wait")]
    pub max_wait_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_hour: default_requests_per_hour(),
            safety_margin: default_safety_margin(),
            low_water_mark: default_low_water_mark(),
            max_wait_seconds: default_max_wait(),
        }
    }
}

fn default_requests_per_hour() -> u32 {
    1000
}

fn default_safety_margin() -> f64 {
    0.1
}

fn default_low_water_mark() -> u64 {
    100
}

fn default_max_wait() -> u64 {
    3600
}

// ============================================================================
// Batching
// ============================================================================

/// Batching and file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Rows per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Checkpoint document location
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Failed-row log location
    #[serde(default = "default_error_log_path")]
    pub error_log_path: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            checkpoint_path: default_checkpoint_path(),
            error_log_path: default_error_log_path(),
        }
    }
}

fn default_batch_size() -> usize {
    100
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from(DEFAULT_CHECKPOINT_PATH)
}

fn default_error_log_path() -> PathBuf {
    PathBuf::from(crate::engine::DEFAULT_ERROR_LOG_PATH)
}

// ============================================================================
// Validation
// ============================================================================

/// Validation settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// JSON snapshot of known entities, required unless `skip_entity_check`
    #[serde(default)]
    pub entities_path: Option<PathBuf>,

    /// Run only the structural rules when no snapshot is given
    #[serde(default)]
    pub skip_entity_check: bool,

    #[serde(flatten)]
    pub rules: ValidatorConfig,
}

// ============================================================================
// Loading and Conversion
// ============================================================================

impl ImportSettings {
    /// Parse settings from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from a YAML file, or defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Overlay `KNESSET_API_KEY` and `KNESSET_API_URL` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Overlay environment values from an arbitrary lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = non_empty(ENV_API_URL) {
            self.api.base_url = url.trim().to_string();
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::invalid_value("api.base_url", e.to_string()))?;
        if self.import.batch_size == 0 {
            return Err(Error::invalid_value("import.batch_size", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value("retry.max_attempts", "must be at least 1"));
        }
        if self.rate_limit.requests_per_hour == 0 {
            return Err(Error::invalid_value(
                "rate_limit.requests_per_hour",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.rate_limit.safety_margin) {
            return Err(Error::invalid_value(
                "rate_limit.safety_margin",
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }

    /// Client configuration; fails without an API key
    pub fn client_config(&self) -> Result<SubmitClientConfig> {
        let api_key = self
            .api
            .api_key
            .clone()
            .ok_or_else(|| Error::missing_field(ENV_API_KEY))?;

        let mut builder = SubmitClientConfig::builder()
            .base_url(&self.api.base_url)
            .api_key(api_key)
            .timeout(Duration::from_secs(self.api.timeout_seconds))
            .retry(self.retry.clone())
            .max_rate_limit_wait(Duration::from_secs(self.rate_limit.max_wait_seconds))
            .duplicate_text_heuristic(self.api.duplicate_text_heuristic);

        builder = if self.rate_limit.enabled {
            builder.rate_limit(RateLimiterConfig::new(
                self.rate_limit.requests_per_hour,
                self.rate_limit.safety_margin,
            ))
        } else {
            builder.no_rate_limit()
        };

        Ok(builder.build())
    }

    /// Engine configuration
    pub fn import_config(&self, resume: bool) -> ImportConfig {
        ImportConfig::new()
            .with_batch_size(self.import.batch_size)
            .with_resume(resume)
            .with_low_water_mark(self.rate_limit.low_water_mark)
            .with_max_rate_limit_wait(Duration::from_secs(self.rate_limit.max_wait_seconds))
            .with_error_log(&self.import.error_log_path)
    }

    /// Checkpoint store at the configured path
    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.import.checkpoint_path)
    }

    /// Validator, with referential checks when an entity snapshot is configured
    pub fn validator(&self) -> Result<Validator> {
        let rules = self.validation.rules.clone();
        match &self.validation.entities_path {
            Some(path) => Ok(Validator::new(rules, EntityCache::load(path)?)),
            None if self.validation.skip_entity_check => Ok(Validator::structural(rules)),
            None => Err(Error::config(
                "no entity snapshot: pass --entities or set validation.entities_path \
                 (--skip-entity-check runs without mkId existence and eligibility checks)",
            )),
        }
    }
}
