//! Polydictions Bot
//!
//! Announces new Polymarket events on Telegram.

use anyhow::Context;
use clap::Parser;
use polydictions_bot::{
    client::{MarketApi, PolymarketClient},
    config::Config,
    monitor::EventMonitor,
    storage::BotStore,
    telegram::{CommandHandler, Messenger, TelegramBot},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "polydictions-bot")]
#[command(about = "Telegram notifications for new Polymarket events")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding the JSON state files (overrides storage.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    // Initialize logging; RUST_LOG wins over logging.level
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting Polydictions bot");

    let token = config.bot_token()?;

    let store = Arc::new(
        BotStore::open(&config.storage.data_dir, config.storage.max_seen_events)
            .await
            .context("failed to load bot state")?,
    );
    let api: Arc<dyn MarketApi> = Arc::new(PolymarketClient::new(&config.polymarket)?);
    let bot = Arc::new(TelegramBot::new(&config.telegram, &token)?);
    let messenger: Arc<dyn Messenger> = bot.clone();

    let handler = Arc::new(CommandHandler::new(
        store.clone(),
        api.clone(),
        messenger.clone(),
    ));
    let monitor = Arc::new(EventMonitor::new(
        store.clone(),
        api,
        messenger,
        config.monitor.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let polling = tokio::spawn(bot.start_polling(handler, shutdown_rx.clone()));
    let monitoring = tokio::spawn(monitor.run(shutdown_rx));

    tracing::info!("Bot is running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = polling.await {
        tracing::error!("Telegram listener task failed: {}", e);
    }
    if let Err(e) = monitoring.await {
        tracing::error!("Monitor task failed: {}", e);
    }

    let subscribers = store.subscribers().await.len();
    let seen = store.seen_count().await;
    tracing::info!("Stopped with {} subscribers and {} seen events", subscribers, seen);
    Ok(())
}
