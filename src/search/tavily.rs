use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Secret, Settings};

const API_BASE: &str = "https://api.tavily.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_DEPTH: &str = "advanced";

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("TAVILY_API_KEY not set. Get one at https://app.tavily.com")]
    ApiKeyNotSet,

    #[error("search rate limit exceeded")]
    RateLimited,

    #[error("search API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// One ranked hit from the search API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Abstraction for keyword web search.
/// Implemented by `TavilyClient` for production; mock implementations used in tests.
pub trait SearchClient {
    async fn search(&self, query: &str, max_results: u8) -> Result<Vec<SearchResult>, SearchError>;
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: u8,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct TavilyClient {
    http: Client,
    api_key: Secret,
    base_url: String,
}

impl std::fmt::Debug for TavilyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TavilyClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TavilyClient {
    pub fn from_settings(http: Client, settings: &Settings) -> Result<Self, SearchError> {
        let api_key = settings
            .tavily_api_key
            .clone()
            .ok_or(SearchError::ApiKeyNotSet)?;
        Ok(Self {
            http,
            api_key,
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: Secret::new("tvly-test"),
            base_url: base_url.to_string(),
        }
    }
}

impl SearchClient for TavilyClient {
    async fn search(&self, query: &str, max_results: u8) -> Result<Vec<SearchResult>, SearchError> {
        let url = format!("{}/search", self.base_url);

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .header("User-Agent", crate::USER_AGENT)
            .json(&SearchRequest {
                query,
                search_depth: SEARCH_DEPTH,
                max_results,
            })
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Tavily API rate limited");
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_detail(&text).unwrap_or_else(|| text.chars().take(200).collect());
            warn!(status = %status, "Tavily API error");
            return Err(SearchError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: SearchResponse = response.json().await?;
        debug!(query, results = body.results.len(), "tavily search complete");
        Ok(body.results)
    }
}

/// Tavily reports errors as `{"detail": {"error": "..."}}` or `{"detail": "..."}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail")?;
    detail
        .get("error")
        .and_then(|e| e.as_str())
        .or_else(|| detail.as_str())
        .map(String::from)
}
