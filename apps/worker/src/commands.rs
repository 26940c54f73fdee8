//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use tracing::info;

use muninn_broker::{AmqpConnector, QueueTopology};
use muninn_core::{DiscoveryPipeline, ErrandHandler, FixedDelay, PipelineLimits, Worker};
use muninn_retrieval::{TavilySearch, UseScraper};
use muninn_shared::{AppConfig, RuntimeSettings, init_config, load_config};
use muninn_synthesis::{ChatClient, LlmQueryGenerator, LlmSynopsisGenerator, TextGenerator};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// muninn: gather evidence for and against claims arriving over RabbitMQ.
#[derive(Parser)]
#[command(
    name = "muninn",
    version,
    about = "Queue-driven worker that answers discovery errands with evidence synopses.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to muninn.toml. Defaults apply when absent.
    #[arg(long, env = "MUNINN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Connect to the broker and process discovery errands until interrupted.
    Run,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a config file with defaults.
    Init {
        /// Where to write the file.
        #[arg(default_value = "muninn.toml")]
        path: PathBuf,
    },
    /// Show resolved configuration and which required env vars are set.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "muninn=info",
        1 => "muninn=debug",
        _ => "muninn=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run(cli.config).await,
        Command::Config { action } => match action {
            ConfigAction::Init { path } => cmd_config_init(path),
            ConfigAction::Show => cmd_config_show(cli.config),
        },
    }
}

async fn cmd_run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    // Fail before touching the broker if anything required is missing.
    let settings = RuntimeSettings::from_env(config)?;
    let mut worker = build_worker(&settings)?;
    let mut policy = FixedDelay(Duration::from_millis(
        settings.config.broker.reconnect_delay_ms,
    ));

    info!(
        host = %settings.broker.host,
        port = settings.broker.port,
        inbound = %settings.config.broker.inbound_queue,
        reply = %settings.config.broker.reply_queue,
        model = %settings.config.llm.model,
        "starting muninn worker"
    );

    tokio::select! {
        () = worker.run(&mut policy) => {
            Err(eyre!("errand loop exited unexpectedly"))
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown requested");
            Ok(())
        }
    }
}

/// Wire the production collaborators into a worker.
fn build_worker(settings: &RuntimeSettings) -> Result<Worker<AmqpConnector>> {
    let config = &settings.config;

    let web = muninn_retrieval::build_client(config.scraper.request_timeout_secs)?;
    let search = TavilySearch::new(
        web.clone(),
        settings.search_endpoint.clone(),
        settings.search_api_key.clone(),
    )
    .with_search_depth(config.search.search_depth.clone());
    let retriever = UseScraper::new(
        web,
        settings.scraper_endpoint.clone(),
        settings.scraper_api_key.clone(),
    )
    .with_options(config.scraper.format.clone(), config.scraper.advanced_proxy);

    let llm_http = muninn_retrieval::build_client(config.llm.request_timeout_secs)?;
    let chat: Arc<dyn TextGenerator> = Arc::new(ChatClient::new(
        llm_http,
        &settings.llm_base_url,
        settings.llm_api_key.clone(),
        config.llm.model.clone(),
    ));

    let pipeline = DiscoveryPipeline::new(
        Arc::new(LlmQueryGenerator::new(chat.clone())),
        Arc::new(search),
        Arc::new(retriever),
        Arc::new(LlmSynopsisGenerator::new(chat)),
        PipelineLimits::from(&config.pipeline),
    );

    let connector = AmqpConnector::new(
        settings.broker.clone(),
        QueueTopology::from(&config.broker),
    );

    Ok(Worker::new(connector, ErrandHandler::new(pipeline)))
}

fn cmd_config_init(path: PathBuf) -> Result<()> {
    init_config(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    println!("{}", toml::to_string_pretty(&config)?);

    println!("# required environment");
    for name in required_env(&config) {
        let state = match std::env::var(name) {
            Ok(val) if !val.trim().is_empty() => "set",
            _ => "MISSING",
        };
        println!("#   {name}: {state}");
    }
    Ok(())
}

fn required_env(config: &AppConfig) -> [&str; 7] {
    [
        config.broker.host_env.as_str(),
        config.broker.port_env.as_str(),
        config.broker.username_env.as_str(),
        config.broker.password_env.as_str(),
        config.search.api_key_env.as_str(),
        config.scraper.api_key_env.as_str(),
        config.llm.api_key_env.as_str(),
    ]
}
