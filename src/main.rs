use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use wbcalc::agent::{Bot, spawn_session_pruner};
use wbcalc::channels::{ChannelManager, HttpChannel, ReplChannel, TelegramChannel, WebhookServer};
use wbcalc::collector::{InMemorySessionStore, InputCollector};
use wbcalc::config::Config;

/// User id of the local terminal session.
const REPL_USER_ID: &str = "local";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "wbcalc", version, about = "Wildberries per-unit profitability bot")]
struct Cli {
    /// Do not start the interactive terminal channel.
    #[arg(long)]
    no_cli: bool,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wbcalc=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Values from .env must be visible to clap's env fallbacks.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = Config::from_env().context("invalid configuration")?;

    let store = Arc::new(InMemorySessionStore::new());
    let collector = Arc::new(InputCollector::new(store.clone()));
    let mut channels = ChannelManager::new();

    if config.cli_enabled && !cli.no_cli {
        channels.register(Box::new(ReplChannel::new(REPL_USER_ID)))?;
    }

    if let Some(telegram) = config.telegram.clone() {
        channels.register(Box::new(TelegramChannel::new(telegram)?))?;
    }

    let mut webhook_server = None;
    if let Some(http) = config.http.clone() {
        let channel = HttpChannel::new(&http);
        let server = WebhookServer::bind(&http.host, http.port, channel.routes()).await?;
        webhook_server = Some(server);
        channels.register(Box::new(channel))?;
    }

    let names = channels.names();
    if names.is_empty() {
        anyhow::bail!(
            "no channels enabled: set TELEGRAM_BOT_TOKEN or HTTP_PORT, or run without --no-cli"
        );
    }
    tracing::info!(channels = ?names, "Starting bot");
    let channels = Arc::new(channels);

    let pruner = spawn_session_pruner(store, config.session.clone());

    let bot = Bot::new(Arc::clone(&channels), collector);
    tokio::select! {
        result = bot.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            channels.shutdown_all().await;
        }
    }

    if let Some(handle) = pruner {
        handle.abort();
    }
    if let Some(server) = webhook_server {
        server.shutdown().await;
    }

    Ok(())
}
