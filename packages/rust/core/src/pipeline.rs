//! Discovery pipeline: claim → queries → search → retrieve → synopsis → reply.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument};

use muninn_retrieval::{ContentRetriever, SearchProvider};
use muninn_shared::{
    DiscoveryReply, MAX_QUERIES_PER_SIDE, MAX_URLS_PER_QUERY, MuninnError, PipelineConfig, Result,
};
use muninn_synthesis::{QueryGenerator, SynopsisGenerator};

/// Separator placed between retrieved pages before synthesis.
const PAGE_SEPARATOR: &str = "\n\n";

/// Caps applied after generation and after search. Never above 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineLimits {
    pub max_queries_per_side: usize,
    pub max_urls_per_query: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineLimits {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_queries_per_side: config.max_queries_per_side.min(MAX_QUERIES_PER_SIDE),
            max_urls_per_query: config.max_urls_per_query.min(MAX_URLS_PER_QUERY),
        }
    }
}

/// Result of investigating a single search query.
#[derive(Debug)]
pub enum QueryOutcome {
    Synopsis(String),
    /// Search, retrieval, or synthesis failed; the query still occupies its slot.
    Failed(MuninnError),
}

impl QueryOutcome {
    /// The synopsis text, or an empty string for a failed query.
    pub fn into_synopsis(self) -> String {
        match self {
            Self::Synopsis(text) => text,
            Self::Failed(_) => String::new(),
        }
    }
}

/// Orchestrates the collaborators for one discovery errand.
pub struct DiscoveryPipeline {
    queries: Arc<dyn QueryGenerator>,
    search: Arc<dyn SearchProvider>,
    retriever: Arc<dyn ContentRetriever>,
    synopses: Arc<dyn SynopsisGenerator>,
    limits: PipelineLimits,
}

impl DiscoveryPipeline {
    pub fn new(
        queries: Arc<dyn QueryGenerator>,
        search: Arc<dyn SearchProvider>,
        retriever: Arc<dyn ContentRetriever>,
        synopses: Arc<dyn SynopsisGenerator>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            queries,
            search,
            retriever,
            synopses,
            limits,
        }
    }

    /// Run discovery for `message`.
    ///
    /// Query generation failures propagate. Everything after that is absorbed
    /// per query, so the reply always holds exactly one entry per kept query:
    /// supporting queries first, then opposing, each in generation order.
    #[instrument(skip_all)]
    pub async fn discover(&self, message: &str) -> Result<DiscoveryReply> {
        let start = Instant::now();

        info!("determining supporting search queries");
        let mut supporting = self.queries.generate_supporting(message).await?;
        info!(?supporting, "supporting search queries");

        info!("determining opposing search queries");
        let mut opposing = self.queries.generate_opposing(message).await?;
        info!(?opposing, "opposing search queries");

        supporting.truncate(self.limits.max_queries_per_side);
        opposing.truncate(self.limits.max_queries_per_side);

        let mut discovery_result = Vec::with_capacity(supporting.len() + opposing.len());
        for query in supporting.iter().chain(&opposing) {
            discovery_result.push(self.investigate(query).await.into_synopsis());
        }

        info!(
            supporting = supporting.len(),
            opposing = opposing.len(),
            empty = discovery_result.iter().filter(|s| s.is_empty()).count(),
            elapsed_ms = start.elapsed().as_millis(),
            "discovery completed"
        );

        Ok(DiscoveryReply { discovery_result })
    }

    /// Search, retrieve, and synthesize for one query.
    #[instrument(skip_all, fields(query = %query))]
    pub async fn investigate(&self, query: &str) -> QueryOutcome {
        match self.synopsis_for(query).await {
            Ok(synopsis) => {
                info!(%synopsis, "generated synopsis for search query");
                QueryOutcome::Synopsis(synopsis)
            }
            Err(e) => {
                error!(error = %e, "search encountered error");
                QueryOutcome::Failed(e)
            }
        }
    }

    async fn synopsis_for(&self, query: &str) -> Result<String> {
        let urls: Vec<String> = self
            .search
            .search(query)
            .await?
            .into_iter()
            .take(self.limits.max_urls_per_query)
            .filter_map(|hit| hit.url)
            .collect();
        info!(?urls, "search returned urls");

        let mut pages = Vec::with_capacity(urls.len());
        for url in &urls {
            if let Some(text) = self.retriever.fetch(url).await.into_content() {
                pages.push(text);
            }
        }
        debug!(retrieved = pages.len(), of = urls.len(), "retrieval finished");

        self.synopses
            .synthesize(query, &pages.join(PAGE_SEPARATOR))
            .await
    }
}
