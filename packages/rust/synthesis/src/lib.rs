//! Text generation for discovery: search-query generation and search synopses.
//!
//! Both generators are thin contracts over a [`TextGenerator`]; the only
//! production generator is the OpenAI-compatible [`ChatClient`]. Failures
//! propagate to the caller unchanged.

mod chat;
mod prompts;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use muninn_shared::{MuninnError, Result};

pub use chat::ChatClient;
pub use prompts::{ChatMessage, PromptTemplate};

/// Renders a prompt template and returns the model's JSON object.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, template: PromptTemplate, vars: &[(&str, &str)]) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// Query generation
// ---------------------------------------------------------------------------

/// Which side of a claim a batch of search queries should surface evidence for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stance {
    Supporting,
    Opposing,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supporting => "supporting",
            Self::Opposing => "opposing",
        }
    }

    fn template(&self) -> PromptTemplate {
        match self {
            Self::Supporting => PromptTemplate::SupportingDiscovery,
            Self::Opposing => PromptTemplate::OpposingDiscovery,
        }
    }
}

/// Produces candidate search queries for a claim.
///
/// The returned list may be any length, including empty; callers truncate.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, stance: Stance, message: &str) -> Result<Vec<String>>;

    async fn generate_supporting(&self, message: &str) -> Result<Vec<String>> {
        self.generate(Stance::Supporting, message).await
    }

    async fn generate_opposing(&self, message: &str) -> Result<Vec<String>> {
        self.generate(Stance::Opposing, message).await
    }
}

/// [`QueryGenerator`] reading the `search_queries` field of a model response.
pub struct LlmQueryGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl LlmQueryGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(&self, stance: Stance, message: &str) -> Result<Vec<String>> {
        let output = self
            .generator
            .generate(stance.template(), &[("message", message)])
            .await?;
        let queries = search_queries(stance, &output)?;
        debug!(stance = stance.as_str(), ?queries, "generated search queries");
        Ok(queries)
    }
}

/// Extract `search_queries`. The field must be an array; non-string entries are dropped.
fn search_queries(stance: Stance, output: &Value) -> Result<Vec<String>> {
    let items = output
        .get("search_queries")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            MuninnError::Generation(format!(
                "{}: no search_queries array",
                stance.template().name()
            ))
        })?;

    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Synopsis generation
// ---------------------------------------------------------------------------

/// Condenses retrieved page content into a synopsis for one query.
#[async_trait]
pub trait SynopsisGenerator: Send + Sync {
    async fn synthesize(&self, search_query: &str, web_content: &str) -> Result<String>;
}

/// [`SynopsisGenerator`] reading the `synopsis` field of a model response.
pub struct LlmSynopsisGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl LlmSynopsisGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl SynopsisGenerator for LlmSynopsisGenerator {
    async fn synthesize(&self, search_query: &str, web_content: &str) -> Result<String> {
        let output = self
            .generator
            .generate(
                PromptTemplate::SearchSynopsis,
                &[("search_query", search_query), ("web_content", web_content)],
            )
            .await?;

        output
            .get("synopsis")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| MuninnError::Generation("search_synopsis: no synopsis field".into()))
    }
}
