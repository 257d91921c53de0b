//! HTTP Origin Adapter
//!
//! Implements the `OriginFetcher` port with a single GET per query against
//! a URL template. The default template targets the Wikipedia parse API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::{CacheEntry, OriginFetcher, Provenance, SearchQuery};
use crate::error::{Error, Result};

/// Placeholder replaced by the percent-encoded query
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Wikipedia parse API, first section only
pub const DEFAULT_ORIGIN_URL_TEMPLATE: &str =
    "https://en.wikipedia.org/w/api.php?action=parse&format=json&section=0&page={query}";

/// Origin configuration
#[derive(Debug, Clone)]
pub struct OriginConfig {
    /// URL with a `{query}` placeholder
    pub url_template: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// User-Agent header sent upstream
    pub user_agent: String,
    /// Treat a top-level `error` member as a failed fetch
    pub reject_error_documents: bool,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_ORIGIN_URL_TEMPLATE.to_string(),
            timeout: Duration::from_secs(10),
            user_agent: format!("readthrough/{}", env!("CARGO_PKG_VERSION")),
            reject_error_documents: true,
        }
    }
}

/// Origin fetcher over HTTP
pub struct HttpOriginFetcher {
    config: OriginConfig,
    client: Client,
}

impl HttpOriginFetcher {
    /// Create a fetcher; the HTTP client is built once and shared
    pub fn new(config: OriginConfig) -> Result<Self> {
        if !config.url_template.contains(QUERY_PLACEHOLDER) {
            return Err(Error::Config(format!(
                "origin URL template must contain {}: {}",
                QUERY_PLACEHOLDER, config.url_template
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Request URL for `query`
    pub fn url_for(&self, query: &SearchQuery) -> String {
        self.config
            .url_template
            .replace(QUERY_PLACEHOLDER, &urlencoding::encode(query.as_str()))
    }

    pub fn config(&self) -> &OriginConfig {
        &self.config
    }
}

impl std::fmt::Debug for HttpOriginFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpOriginFetcher")
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl OriginFetcher for HttpOriginFetcher {
    #[instrument(skip(self), fields(query = %query))]
    async fn fetch(&self, query: &SearchQuery) -> Result<CacheEntry> {
        let url = self.url_for(query);
        debug!("Fetching from origin: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::OriginConnection)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::OriginStatus {
                status: status.as_u16(),
                url,
            });
        }

        let document: Value = response
            .json()
            .await
            .map_err(|e| Error::OriginParse(e.to_string()))?;

        if self.config.reject_error_documents {
            if let Some(error) = document.get("error") {
                return Err(Error::OriginRejected(describe_error(error)));
            }
        }

        CacheEntry::from_record(document, Provenance::Origin)
    }
}

/// Human-readable summary of an upstream error member.
fn describe_error(error: &Value) -> String {
    let code = error.get("code").and_then(Value::as_str);
    let info = error.get("info").and_then(Value::as_str);
    match (code, info) {
        (Some(code), Some(info)) => format!("{}: {}", code, info),
        (None, Some(info)) => info.to_string(),
        (Some(code), None) => code.to_string(),
        (None, None) => error.to_string(),
    }
}
