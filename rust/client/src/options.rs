use std::time::Duration;

use backon::ExponentialBuilder;
use base64::Engine;
use mapsync_config::{AuthConfig, ElasticsearchConfig, RetryConfig};
use mapsync_error::{ErrorCodes, MapsyncError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, AUTHORIZATION};

#[derive(Clone, Debug)]
pub struct ElasticsearchRetryOptions {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for ElasticsearchRetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl From<&RetryConfig> for ElasticsearchRetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            min_delay: config.min_delay,
            max_delay: config.max_delay,
            jitter: config.jitter,
        }
    }
}

impl From<ElasticsearchRetryOptions> for ExponentialBuilder {
    fn from(options: ElasticsearchRetryOptions) -> Self {
        let mut builder = ExponentialBuilder::new()
            .with_max_times(options.max_retries)
            .with_min_delay(options.min_delay)
            .with_max_delay(options.max_delay);
        if options.jitter {
            builder = builder.with_jitter();
        }
        builder
    }
}

#[derive(Debug, Clone)]
pub enum ElasticsearchAuthMethod {
    None,
    HeaderAuth {
        header: HeaderName,
        value: HeaderValue,
    },
}

impl ElasticsearchAuthMethod {
    pub fn basic(username: &str, password: &str) -> Result<Self, InvalidHeaderValue> {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        Self::authorization(&format!("Basic {credentials}"))
    }

    pub fn api_key(key: &str) -> Result<Self, InvalidHeaderValue> {
        Self::authorization(&format!("ApiKey {key}"))
    }

    fn authorization(value: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(value)?;
        value.set_sensitive(true);

        Ok(ElasticsearchAuthMethod::HeaderAuth {
            header: AUTHORIZATION,
            value,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ElasticsearchClientOptionsError {
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

impl MapsyncError for ElasticsearchClientOptionsError {
    fn code(&self) -> ErrorCodes {
        match self {
            ElasticsearchClientOptionsError::InvalidHeaderValue(_)
            | ElasticsearchClientOptionsError::InvalidEndpoint(_) => ErrorCodes::InvalidArgument,
            ElasticsearchClientOptionsError::Build(_) => ErrorCodes::Internal,
        }
    }
}

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9200";

#[derive(Debug, Clone)]
pub struct ElasticsearchClientOptions {
    /// Base URL of the cluster. Parsed when the client is built.
    pub endpoint: String,
    pub auth_method: ElasticsearchAuthMethod,
    pub retry_options: ElasticsearchRetryOptions,
    pub request_timeout: Duration,
}

impl Default for ElasticsearchClientOptions {
    fn default() -> Self {
        ElasticsearchClientOptions {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth_method: ElasticsearchAuthMethod::None,
            retry_options: ElasticsearchRetryOptions::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ElasticsearchClientOptions {
    pub fn from_config(config: &ElasticsearchConfig) -> Result<Self, ElasticsearchClientOptionsError> {
        let auth_method = match &config.auth {
            AuthConfig::None => ElasticsearchAuthMethod::None,
            AuthConfig::Basic { username, password } => {
                ElasticsearchAuthMethod::basic(username, password)?
            }
            AuthConfig::ApiKey { key } => ElasticsearchAuthMethod::api_key(key)?,
        };
        Ok(ElasticsearchClientOptions {
            endpoint: config.endpoint.clone(),
            auth_method,
            retry_options: ElasticsearchRetryOptions::from(&config.retry),
            request_timeout: config.request_timeout,
        })
    }

    /// The endpoint as a base URL that relative paths can be appended to.
    pub(crate) fn base_url(&self) -> Result<reqwest::Url, ElasticsearchClientOptionsError> {
        let url = self.endpoint.parse::<reqwest::Url>().map_err(|err| {
            ElasticsearchClientOptionsError::InvalidEndpoint(format!("{}: {err}", self.endpoint))
        })?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(ElasticsearchClientOptionsError::InvalidEndpoint(
                self.endpoint.clone(),
            ));
        }
        Ok(url)
    }

    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match &self.auth_method {
            ElasticsearchAuthMethod::HeaderAuth { header, value } => {
                headers.insert(header.clone(), value.clone());
            }
            ElasticsearchAuthMethod::None => {}
        }
        headers
    }
}
