//! Web evidence retrieval: search-provider hits and scraped page content.
//!
//! Both collaborators sit behind traits so the discovery pipeline can be
//! exercised without network access.

pub mod scrape;
pub mod search;

use std::time::Duration;

use muninn_shared::{MuninnError, Result};
use reqwest::Client;

pub use scrape::{ContentRetriever, Retrieval, SkipReason, UseScraper};
pub use search::{SearchHit, SearchProvider, TavilySearch};

/// User-Agent string for outbound provider requests.
const USER_AGENT: &str = concat!("muninn/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client shared by the search and scrape adapters.
/// This is the only request timeout in the pipeline.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MuninnError::Network(format!("failed to build HTTP client: {e}")))
}
