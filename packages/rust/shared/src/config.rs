//! Worker configuration.
//!
//! Non-secret settings live in an optional TOML file (`muninn.toml`); every
//! field has a default, so a missing file is fine. Secrets never live in the
//! file: it only names the environment variables that hold them, and those are
//! resolved once at startup into [`RuntimeSettings`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MuninnError, Result};

// ---------------------------------------------------------------------------
// Config structs (matching muninn.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Upper bound for `pipeline.max_queries_per_side`.
pub const MAX_QUERIES_PER_SIDE: usize = 3;

/// Upper bound for `pipeline.max_urls_per_query`.
pub const MAX_URLS_PER_QUERY: usize = 3;

impl AppConfig {
    /// Reject settings that would break the worker's delivery or reply guarantees.
    ///
    /// The broker must hand out one unacknowledged errand at a time (a prefetch
    /// of 0 means unlimited in AMQP), and the reply holds at most three
    /// synopses per side.
    pub fn validate(&self) -> Result<()> {
        if self.broker.prefetch != 1 {
            return Err(MuninnError::config(format!(
                "broker.prefetch must be 1, got {}",
                self.broker.prefetch
            )));
        }
        if self.pipeline.max_queries_per_side > MAX_QUERIES_PER_SIDE {
            return Err(MuninnError::config(format!(
                "pipeline.max_queries_per_side must be at most {MAX_QUERIES_PER_SIDE}, got {}",
                self.pipeline.max_queries_per_side
            )));
        }
        if self.pipeline.max_urls_per_query > MAX_URLS_PER_QUERY {
            return Err(MuninnError::config(format!(
                "pipeline.max_urls_per_query must be at most {MAX_URLS_PER_QUERY}, got {}",
                self.pipeline.max_urls_per_query
            )));
        }
        Ok(())
    }
}

/// `[broker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Queue errands are consumed from.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: String,

    /// Queue echoes are published to.
    #[serde(default = "default_reply_queue")]
    pub reply_queue: String,

    /// Unacknowledged deliveries allowed in flight. Only 1 is accepted.
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,

    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_vhost")]
    pub vhost: String,

    #[serde(default = "default_host_env")]
    pub host_env: String,

    #[serde(default = "default_port_env")]
    pub port_env: String,

    #[serde(default = "default_username_env")]
    pub username_env: String,

    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_queue: default_inbound_queue(),
            reply_queue: default_reply_queue(),
            prefetch: default_prefetch(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            vhost: default_vhost(),
            host_env: default_host_env(),
            port_env: default_port_env(),
            username_env: default_username_env(),
            password_env: default_password_env(),
        }
    }
}

fn default_inbound_queue() -> String {
    "discovery".into()
}
fn default_reply_queue() -> String {
    "echo".into()
}
fn default_prefetch() -> u16 {
    1
}
fn default_reconnect_delay_ms() -> u64 {
    3000
}
fn default_vhost() -> String {
    "/".into()
}
fn default_host_env() -> String {
    "RABBIT_HOST".into()
}
fn default_port_env() -> String {
    "RABBIT_PORT".into()
}
fn default_username_env() -> String {
    "RABBIT_USERNAME".into()
}
fn default_password_env() -> String {
    "RABBIT_PASSWORD".into()
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Tavily search depth: "basic" or "advanced".
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            search_depth: default_search_depth(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://api.tavily.com/search".into()
}
fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_depth() -> String {
    "basic".into()
}

/// `[scraper]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_endpoint")]
    pub endpoint: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_scraper_key_env")]
    pub api_key_env: String,

    /// Output format requested from the scraper.
    #[serde(default = "default_scrape_format")]
    pub format: String,

    #[serde(default)]
    pub advanced_proxy: bool,

    /// Per-request timeout for scraper and search calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            endpoint: default_scraper_endpoint(),
            api_key_env: default_scraper_key_env(),
            format: default_scrape_format(),
            advanced_proxy: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_scraper_endpoint() -> String {
    "https://api.usescraper.com/scraper/scrape".into()
}
fn default_scraper_key_env() -> String {
    "USE_SCRAPER_API_KEY".into()
}
fn default_scrape_format() -> String {
    "markdown".into()
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// `[llm]` section. Any OpenAI-compatible chat-completions endpoint works.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Per-request timeout for chat completions.
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key_env: default_llm_key_env(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Generated queries kept per side (supporting / opposing), at most 3.
    #[serde(default = "default_max_queries")]
    pub max_queries_per_side: usize,

    /// Search hits considered per query, at most 3.
    #[serde(default = "default_max_urls")]
    pub max_urls_per_query: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_queries_per_side: default_max_queries(),
            max_urls_per_query: default_max_urls(),
        }
    }
}

fn default_max_queries() -> usize {
    3
}
fn default_max_urls() -> usize {
    3
}

// ---------------------------------------------------------------------------
// Runtime settings (config file + environment)
// ---------------------------------------------------------------------------

/// Broker connection details resolved from the environment.
#[derive(Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub vhost: String,
}

impl BrokerSettings {
    /// Build the `amqp://` URI for this broker, percent-encoding credentials.
    pub fn amqp_uri(&self) -> Result<String> {
        let mut uri = Url::parse(&format!("amqp://{}:{}", self.host, self.port))
            .map_err(|e| MuninnError::config(format!("invalid broker host '{}': {e}", self.host)))?;
        uri.set_username(&self.username)
            .map_err(|()| MuninnError::config("broker username cannot be set on URI"))?;
        uri.set_password(Some(&self.password))
            .map_err(|()| MuninnError::config("broker password cannot be set on URI"))?;
        if self.vhost != "/" {
            uri.set_path(&format!("/{}", self.vhost.trim_start_matches('/')));
        }
        Ok(uri.to_string())
    }
}

impl std::fmt::Debug for BrokerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("vhost", &self.vhost)
            .finish_non_exhaustive()
    }
}

/// Everything the worker needs at runtime, with secrets resolved.
#[derive(Clone)]
pub struct RuntimeSettings {
    pub config: AppConfig,
    pub broker: BrokerSettings,
    pub search_endpoint: Url,
    pub search_api_key: String,
    pub scraper_endpoint: Url,
    pub scraper_api_key: String,
    pub llm_base_url: Url,
    pub llm_api_key: String,
}

impl std::fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("broker", &self.broker)
            .field("search_endpoint", &self.search_endpoint.as_str())
            .field("scraper_endpoint", &self.scraper_endpoint.as_str())
            .field("llm_base_url", &self.llm_base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl RuntimeSettings {
    /// Resolve settings from the process environment.
    pub fn from_env(config: AppConfig) -> Result<Self> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings using `lookup` to read environment variables.
    ///
    /// Fails if the config does not [validate](AppConfig::validate) or any
    /// required variable is missing or empty.
    pub fn resolve(config: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        config.validate()?;

        let required = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(val) if !val.trim().is_empty() => Ok(val),
                _ => Err(MuninnError::config(format!(
                    "required environment variable {name} is not set"
                ))),
            }
        };

        let port_raw = required(&config.broker.port_env)?;
        let port = port_raw.trim().parse::<u16>().map_err(|e| {
            MuninnError::config(format!(
                "{} must be a port number, got '{port_raw}': {e}",
                config.broker.port_env
            ))
        })?;

        let broker = BrokerSettings {
            host: required(&config.broker.host_env)?,
            port,
            username: required(&config.broker.username_env)?,
            password: required(&config.broker.password_env)?,
            vhost: config.broker.vhost.clone(),
        };

        Ok(Self {
            broker,
            search_endpoint: parse_endpoint("search.endpoint", &config.search.endpoint)?,
            search_api_key: required(&config.search.api_key_env)?,
            scraper_endpoint: parse_endpoint("scraper.endpoint", &config.scraper.endpoint)?,
            scraper_api_key: required(&config.scraper.api_key_env)?,
            llm_base_url: parse_endpoint("llm.base_url", &config.llm.base_url)?,
            llm_api_key: required(&config.llm.api_key_env)?,
            config,
        })
    }
}

fn parse_endpoint(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| MuninnError::config(format!("{field} '{raw}' is not a URL: {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the application config. Returns defaults when no path is given or the file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MuninnError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| MuninnError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Write a default config file to `path`. Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(MuninnError::validation(format!(
            "{} already exists",
            path.display()
        )));
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| MuninnError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| MuninnError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| MuninnError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}
