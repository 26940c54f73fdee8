//! Errand processing for the muninn worker.
//!
//! This crate ties together query generation, web retrieval, and synthesis
//! into the discovery pipeline, and runs it behind the broker errand loop.

pub mod errand;
pub mod pipeline;
pub mod worker;

#[cfg(test)]
mod testing;

pub use errand::ErrandHandler;
pub use pipeline::{DiscoveryPipeline, PipelineLimits, QueryOutcome};
pub use worker::{ConnectionState, FixedDelay, ReconnectPolicy, Worker};
