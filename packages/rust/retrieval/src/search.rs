//! Search provider adapter (Tavily).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use muninn_shared::{MuninnError, Result};

const PROVIDER: &str = "tavily";

/// One ranked search result. Providers occasionally return entries without a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: Option<String>,
}

impl SearchHit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

/// Returns ranked candidate URLs for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run `query` against the provider, best hit first.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// Tavily
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    /// Absent means no hits; the query still gets a synopsis of empty content.
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    url: Option<String>,
}

/// [`SearchProvider`] backed by the Tavily search API.
pub struct TavilySearch {
    client: Client,
    endpoint: Url,
    api_key: String,
    search_depth: String,
}

impl TavilySearch {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
            search_depth: "basic".into(),
        }
    }

    /// Override the search depth ("basic" or "advanced").
    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "query": query,
            "search_depth": self.search_depth,
        });

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MuninnError::Network(format!("{PROVIDER}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MuninnError::provider(
                PROVIDER,
                format!("HTTP {status}: {text}"),
            ));
        }

        let payload: TavilyResponse = response
            .json()
            .await
            .map_err(|e| MuninnError::provider(PROVIDER, format!("unexpected response: {e}")))?;

        let hits: Vec<SearchHit> = payload
            .results
            .into_iter()
            .map(|r| SearchHit { url: r.url })
            .collect();

        debug!(hits = hits.len(), "search returned");
        Ok(hits)
    }
}
