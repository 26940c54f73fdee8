//! muninn: queue-driven evidence discovery worker.
//!
//! Consumes discovery errands from the broker, gathers supporting and
//! opposing web evidence for each claim, and publishes the synopses back.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
