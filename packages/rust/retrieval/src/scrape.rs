//! Content retriever backed by the UseScraper API.
//!
//! Retrieval never fails the caller: every problem with a single URL becomes
//! a [`Retrieval::Skipped`] and the URL simply contributes no text.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

/// Status the scraper reports for a successfully rendered page.
const SCRAPED: &str = "scraped";

/// Outcome of fetching one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// Rendered page text.
    Content(String),
    /// No usable content; the URL is skipped.
    Skipped(SkipReason),
}

impl Retrieval {
    /// The retrieved text, if any.
    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Content(text) => Some(text),
            Self::Skipped(_) => None,
        }
    }
}

/// Why a URL contributed no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Transport(String),
    NotJson { content_type: String, body: String },
    Undecodable(String),
    NotScraped { status: String, body: String },
    MissingText,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "request failed: {e}"),
            Self::NotJson { content_type, body } => {
                write!(f, "no json in response ({content_type}): {body}")
            }
            Self::Undecodable(e) => write!(f, "response json could not be decoded: {e}"),
            Self::NotScraped { status, body } => write!(f, "scrape status '{status}': {body}"),
            Self::MissingText => write!(f, "scraped response had no text"),
        }
    }
}

/// Fetches rendered page content for a URL.
#[async_trait]
pub trait ContentRetriever: Send + Sync {
    async fn fetch(&self, url: &str) -> Retrieval;
}

// ---------------------------------------------------------------------------
// UseScraper
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    format: &'a str,
    advanced_proxy: bool,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// [`ContentRetriever`] that asks UseScraper to render the page as markdown.
pub struct UseScraper {
    client: Client,
    endpoint: Url,
    api_key: String,
    format: String,
    advanced_proxy: bool,
}

impl UseScraper {
    pub fn new(client: Client, endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key: api_key.into(),
            format: "markdown".into(),
            advanced_proxy: false,
        }
    }

    /// Override the requested output format and proxy mode.
    pub fn with_options(mut self, format: impl Into<String>, advanced_proxy: bool) -> Self {
        self.format = format.into();
        self.advanced_proxy = advanced_proxy;
        self
    }

    async fn scrape(&self, url: &str) -> Result<String, SkipReason> {
        let request = ScrapeRequest {
            url,
            format: &self.format,
            advanced_proxy: self.advanced_proxy,
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SkipReason::Transport(e.to_string()))?;

        let http_status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| SkipReason::Transport(e.to_string()))?;

        if !content_type.contains("application/json") {
            return Err(SkipReason::NotJson { content_type, body });
        }

        let parsed: ScrapeResponse =
            serde_json::from_str(&body).map_err(|e| SkipReason::Undecodable(e.to_string()))?;

        match parsed.status.as_deref() {
            Some(SCRAPED) => parsed.text.ok_or(SkipReason::MissingText),
            other => {
                debug!(%http_status, "scrape not completed");
                Err(SkipReason::NotScraped {
                    status: other.unwrap_or("<none>").to_string(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl ContentRetriever for UseScraper {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Retrieval {
        debug!("scraping url");
        match self.scrape(url).await {
            Ok(text) => Retrieval::Content(text),
            Err(reason) => {
                warn!(%url, %reason, "scrape failed, skipping url");
                Retrieval::Skipped(reason)
            }
        }
    }
}
