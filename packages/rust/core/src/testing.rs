//! In-memory collaborators for pipeline, handler, and worker tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use muninn_broker::{BrokerConnector, ErrandSession, InboundDelivery};
use muninn_retrieval::{ContentRetriever, Retrieval, SearchHit, SearchProvider, SkipReason};
use muninn_shared::{MuninnError, Result};
use muninn_synthesis::{QueryGenerator, Stance, SynopsisGenerator};

use crate::pipeline::{DiscoveryPipeline, PipelineLimits};
use crate::worker::ReconnectPolicy;

// ---------------------------------------------------------------------------
// Pipeline collaborators
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FixedQueries {
    pub supporting: Vec<String>,
    pub opposing: Vec<String>,
    pub fail: bool,
    pub calls: Mutex<Vec<(Stance, String)>>,
}

impl FixedQueries {
    pub fn new(supporting: &[&str], opposing: &[&str]) -> Self {
        Self {
            supporting: supporting.iter().map(|s| s.to_string()).collect(),
            opposing: opposing.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl QueryGenerator for FixedQueries {
    async fn generate(&self, stance: Stance, message: &str) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push((stance, message.to_string()));
        if self.fail {
            return Err(MuninnError::Generation("model unavailable".into()));
        }
        Ok(match stance {
            Stance::Supporting => self.supporting.clone(),
            Stance::Opposing => self.opposing.clone(),
        })
    }
}

/// Search results keyed by query; unknown queries fail.
#[derive(Default)]
pub struct MapSearch {
    pub results: HashMap<String, Vec<SearchHit>>,
    pub calls: Mutex<Vec<String>>,
}

impl MapSearch {
    pub fn with(mut self, query: &str, urls: &[Option<&str>]) -> Self {
        let hits = urls
            .iter()
            .map(|u| SearchHit {
                url: u.map(String::from),
            })
            .collect();
        self.results.insert(query.to_string(), hits);
        self
    }

    /// Every query gets one page at `https://<query-with-dashes>.example/`.
    pub fn one_page_each(queries: &[&str]) -> Self {
        let mut search = Self::default();
        for q in queries {
            let url = page_url(q);
            search = search.with(q, &[Some(url.as_str())]);
        }
        search
    }
}

pub fn page_url(query: &str) -> String {
    format!("https://{}.example/", query.replace(' ', "-"))
}

#[async_trait]
impl SearchProvider for MapSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.calls.lock().unwrap().push(query.to_string());
        self.results
            .get(query)
            .cloned()
            .ok_or_else(|| MuninnError::provider("fake", format!("no results for {query}")))
    }
}

/// Page text keyed by URL; unknown URLs are skipped as transport failures.
#[derive(Default)]
pub struct MapRetriever {
    pub pages: HashMap<String, Retrieval>,
    pub calls: Mutex<Vec<String>>,
}

impl MapRetriever {
    pub fn with(mut self, url: &str, retrieval: Retrieval) -> Self {
        self.pages.insert(url.to_string(), retrieval);
        self
    }

    /// Every URL returns its own address as content.
    pub fn echoing(urls: impl IntoIterator<Item = String>) -> Self {
        let mut retriever = Self::default();
        for url in urls {
            let text = format!("content of {url}");
            retriever = retriever.with(&url, Retrieval::Content(text));
        }
        retriever
    }
}

#[async_trait]
impl ContentRetriever for MapRetriever {
    async fn fetch(&self, url: &str) -> Retrieval {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Retrieval::Skipped(SkipReason::Transport("unreachable".into())))
    }
}

/// Synopsis is `"<query> <= <web_content>"`; listed queries fail.
#[derive(Default)]
pub struct ConcatSynopsis {
    pub failing: HashSet<String>,
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl SynopsisGenerator for ConcatSynopsis {
    async fn synthesize(&self, search_query: &str, web_content: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((search_query.to_string(), web_content.to_string()));
        if self.failing.contains(search_query) {
            return Err(MuninnError::Generation("synopsis failed".into()));
        }
        Ok(format!("{search_query} <= {web_content}"))
    }
}

pub struct Fakes {
    pub queries: Arc<FixedQueries>,
    pub search: Arc<MapSearch>,
    pub retriever: Arc<MapRetriever>,
    pub synopses: Arc<ConcatSynopsis>,
}

impl Fakes {
    pub fn pipeline(&self) -> DiscoveryPipeline {
        DiscoveryPipeline::new(
            self.queries.clone(),
            self.search.clone(),
            self.retriever.clone(),
            self.synopses.clone(),
            PipelineLimits::default(),
        )
    }
}

/// Fakes where every query resolves to a single retrievable page.
pub fn happy_fakes(supporting: &[&str], opposing: &[&str]) -> Fakes {
    let all: Vec<&str> = supporting.iter().chain(opposing).copied().collect();
    Fakes {
        queries: Arc::new(FixedQueries::new(supporting, opposing)),
        search: Arc::new(MapSearch::one_page_each(&all)),
        retriever: Arc::new(MapRetriever::echoing(all.iter().map(|q| page_url(q)))),
        synopses: Arc::new(ConcatSynopsis::default()),
    }
}

pub fn discovery_body(id: &str, message: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "errand_identifier": id,
        "instructions": {"instructions_type": "discovery", "message": message}
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Broker collaborators
// ---------------------------------------------------------------------------

pub enum Step {
    Deliver(InboundDelivery),
    Fail(&'static str),
}

#[derive(Default)]
pub struct SessionLog {
    pub published: Vec<Vec<u8>>,
    pub acked: Vec<u64>,
    pub closed: u32,
}

pub struct ScriptedSession {
    pub steps: VecDeque<Step>,
    pub log: Arc<Mutex<SessionLog>>,
    pub fail_publish: bool,
    pub fail_ack: bool,
}

impl ScriptedSession {
    pub fn new(steps: Vec<Step>, log: Arc<Mutex<SessionLog>>) -> Self {
        Self {
            steps: steps.into(),
            log,
            fail_publish: false,
            fail_ack: false,
        }
    }
}

#[async_trait]
impl ErrandSession for ScriptedSession {
    async fn next_delivery(&mut self) -> Result<Option<InboundDelivery>> {
        match self.steps.pop_front() {
            Some(Step::Deliver(delivery)) => Ok(Some(delivery)),
            Some(Step::Fail(reason)) => Err(MuninnError::Broker(reason.into())),
            None => Ok(None),
        }
    }

    async fn publish(&mut self, body: &[u8]) -> Result<()> {
        if self.fail_publish {
            return Err(MuninnError::Broker("publish refused".into()));
        }
        self.log.lock().unwrap().published.push(body.to_vec());
        Ok(())
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<()> {
        if self.fail_ack {
            return Err(MuninnError::Broker("channel closed".into()));
        }
        self.log.lock().unwrap().acked.push(delivery_tag);
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed += 1;
    }
}

/// Hands out queued sessions; `None` entries (and an empty queue) refuse the connection.
#[derive(Default)]
pub struct ScriptedConnector {
    pub sessions: Mutex<VecDeque<Option<ScriptedSession>>>,
    pub attempts: AtomicU32,
}

impl ScriptedConnector {
    pub fn new(sessions: Vec<Option<ScriptedSession>>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerConnector for ScriptedConnector {
    async fn connect(&self) -> Result<Box<dyn ErrandSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self.sessions.lock().unwrap().pop_front().flatten();
        match next {
            Some(session) => Ok(Box::new(session)),
            None => Err(MuninnError::Broker("connection refused".into())),
        }
    }
}

/// Policy that allows `retries` reconnects, then stops. Zero delay unless set.
pub struct LimitedRetries {
    pub retries: u32,
    pub delay: Duration,
    pub seen_attempts: Vec<u32>,
}

impl LimitedRetries {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            delay: Duration::ZERO,
            seen_attempts: Vec::new(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ReconnectPolicy for LimitedRetries {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.seen_attempts.push(attempt);
        if self.seen_attempts.len() as u32 > self.retries {
            None
        } else {
            Some(self.delay)
        }
    }
}
