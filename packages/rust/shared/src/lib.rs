//! Shared types, error model, and configuration for the muninn worker.
//!
//! This crate is the foundation depended on by all other muninn crates.
//! It provides:
//! - [`MuninnError`], the unified error type
//! - Errand wire types ([`Errand`], [`Instructions`], [`DiscoveryReply`], [`Echo`])
//! - Configuration ([`AppConfig`], [`RuntimeSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrokerConfig, BrokerSettings, LlmConfig, MAX_QUERIES_PER_SIDE, MAX_URLS_PER_QUERY,
    PipelineConfig, RuntimeSettings, ScraperConfig, SearchConfig, init_config, load_config,
    load_config_from,
};
pub use error::{MuninnError, Result};
pub use types::{DiscoveryInstructions, DiscoveryReply, Echo, Errand, Instructions};
