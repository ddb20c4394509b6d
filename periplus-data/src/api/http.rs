//! `reqwest` implementation of [`DatasetApi`].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use super::DatasetApi;
use crate::error::TransportError;

/// Default user agent for dataset requests.
pub const DEFAULT_USER_AGENT: &str = "periplus-data/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while constructing an [`HttpDatasetApi`].
#[derive(Debug, Error)]
pub enum ApiBuildError {
    /// The base URL could not be parsed or cannot carry a path.
    #[error("invalid base URL {url}: {message}")]
    InvalidBaseUrl {
        /// URL as supplied.
        url: String,
        /// Parser message.
        message: String,
    },
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Configuration for [`HttpDatasetApi`].
#[derive(Debug, Clone)]
pub struct HttpDatasetApiConfig {
    /// Base URL of the dataset service (e.g., `"http://localhost:3000"`).
    pub base_url: String,
    /// Request timeout duration.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpDatasetApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpDatasetApiConfig {
    /// Create a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Dataset API client speaking HTTP.
///
/// Issues `GET {base}/api/sources` and
/// `GET {base}/api/sites?source=<id>&limit=<n>`. Any non-2xx response becomes
/// [`TransportError::Http`].
#[derive(Debug, Clone)]
pub struct HttpDatasetApi {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpDatasetApi {
    /// Create a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client fails
    /// to build.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiBuildError> {
        Self::with_config(HttpDatasetApiConfig::new(base_url))
    }

    /// Create a client with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client fails
    /// to build.
    pub fn with_config(config: HttpDatasetApiConfig) -> Result<Self, ApiBuildError> {
        let base = parse_base(&config.base_url)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base,
            timeout: config.timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}/api/{path}", url.path().trim_end_matches('/'));
        url.set_path(&joined);
        url
    }

    fn sources_url(&self) -> Url {
        self.endpoint("sources")
    }

    fn sites_url(&self, source_id: &str, limit: usize) -> Url {
        let mut url = self.endpoint("sites");
        url.query_pairs_mut()
            .append_pair("source", source_id)
            .append_pair("limit", &limit.to_string());
        url
    }

    async fn get_text(&self, url: Url) -> Result<String, TransportError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))
    }

    /// Convert a reqwest error to a [`TransportError`].
    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &Url) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return TransportError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        TransportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

fn parse_base(raw: &str) -> Result<Url, ApiBuildError> {
    let invalid = |message: String| ApiBuildError::InvalidBaseUrl {
        url: raw.to_owned(),
        message,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot be a base".to_owned()));
    }
    Ok(url)
}

#[async_trait]
impl DatasetApi for HttpDatasetApi {
    async fn fetch_source_listing(&self) -> Result<String, TransportError> {
        self.get_text(self.sources_url()).await
    }

    async fn fetch_sites(&self, source_id: &str, limit: usize) -> Result<String, TransportError> {
        self.get_text(self.sites_url(source_id, limit)).await
    }
}
