pub mod helpers;

use figment::providers::{Env, Format, Yaml};
use mapsync_error::{ErrorCodes, MapsyncError};
use mapsync_types::{FailurePolicy, SchemaManagementStrategy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./mapsync_config.yaml";
pub const ENV_PREFIX: &str = "MAPSYNC_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error loading config: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Config file not found: {0}")]
    NotFound(String),
}

impl MapsyncError for ConfigError {
    fn code(&self) -> ErrorCodes {
        match self {
            ConfigError::Load(_) => ErrorCodes::InvalidArgument,
            ConfigError::NotFound(_) => ErrorCodes::NotFound,
        }
    }
}

/// # Description
/// The root config of mapsync. It is read from a YAML file and can be
/// overridden by environment variables prefixed with `MAPSYNC_`, using `__`
/// as the nesting separator. For example `MAPSYNC_MIGRATION__DEFAULT_STRATEGY`
/// sets `migration.default_strategy`. Environment values take precedence
/// over values in the file.
#[derive(Clone, Debug, Deserialize)]
pub struct RootConfig {
    pub migration: MigrationConfig,
}

impl RootConfig {
    /// Load the config from the default location, the current working
    /// directory with the filename `mapsync_config.yaml`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load the config from a specific location. A missing file is not an
    /// error: the config then comes from the environment alone.
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        // Figment splits nested keys on '.', while field names contain '_'.
        let mut f = figment::Figment::from(
            Env::prefixed(ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
        );
        if Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        f.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Like [`RootConfig::load_from_path`], but the file must exist.
    pub fn load_from_existing_path(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::NotFound(path.to_string()));
        }
        Self::load_from_path(path)
    }
}

/// # Description
/// What to manage and how.
/// ## Description of parameters
/// - service_name: Name reported in logs.
/// - elasticsearch: How to reach the engine.
/// - default_strategy: Strategy for indexes that do not set their own.
/// - failure_policy: Whether the first failed index stops the run.
/// - indexes: The schema documents to apply, in order.
/// - log_filters: Extra `target=level` directives for the log filter.
#[derive(Clone, Debug, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "MigrationConfig::default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub default_strategy: SchemaManagementStrategy,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub indexes: Vec<IndexConfig>,
    #[serde(default)]
    pub log_filters: Vec<String>,
}

impl MigrationConfig {
    fn default_service_name() -> String {
        "mapsync".to_string()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct IndexConfig {
    /// Path of the JSON schema document. Relative paths are resolved against
    /// the directory of the config file.
    pub schema_path: PathBuf,
    #[serde(default)]
    pub strategy: Option<SchemaManagementStrategy>,
}

impl IndexConfig {
    pub fn resolved_schema_path(&self, config_dir: &Path) -> PathBuf {
        if self.schema_path.is_absolute() {
            self.schema_path.clone()
        } else {
            config_dir.join(&self.schema_path)
        }
    }

    pub fn strategy_or(&self, default: SchemaManagementStrategy) -> SchemaManagementStrategy {
        self.strategy.unwrap_or(default)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ElasticsearchConfig {
    #[serde(default = "ElasticsearchConfig::default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(
        rename = "request_timeout_ms",
        default = "ElasticsearchConfig::default_request_timeout",
        deserialize_with = "helpers::deserialize_duration_from_millis"
    )]
    pub request_timeout: Duration,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ElasticsearchConfig {
    fn default_endpoint() -> String {
        "http://localhost:9200".to_string()
    }

    fn default_request_timeout() -> Duration {
        Duration::from_secs(30)
    }
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            auth: AuthConfig::default(),
            request_timeout: Self::default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// Sent as `Authorization: ApiKey <key>`.
    ApiKey { key: String },
}

/// Exponential backoff for requests that failed with a server error or no
/// response at all.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "RetryConfig::default_max_retries")]
    pub max_retries: usize,
    #[serde(
        rename = "min_delay_ms",
        default = "RetryConfig::default_min_delay",
        deserialize_with = "helpers::deserialize_duration_from_millis"
    )]
    pub min_delay: Duration,
    #[serde(
        rename = "max_delay_ms",
        default = "RetryConfig::default_max_delay",
        deserialize_with = "helpers::deserialize_duration_from_millis"
    )]
    pub max_delay: Duration,
    #[serde(default = "RetryConfig::default_jitter")]
    pub jitter: bool,
}

impl RetryConfig {
    fn default_max_retries() -> usize {
        3
    }

    fn default_min_delay() -> Duration {
        Duration::from_millis(200)
    }

    fn default_max_delay() -> Duration {
        Duration::from_secs(5)
    }

    fn default_jitter() -> bool {
        true
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            min_delay: Self::default_min_delay(),
            max_delay: Self::default_max_delay(),
            jitter: Self::default_jitter(),
        }
    }
}
