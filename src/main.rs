//! Row counter bot
//!
//! Tracks named running counts per chat through a Telegram conversation.
//! A pure conversation state machine decides what to do; a per-chat runtime
//! applies its effects against SQLite one event at a time.

mod config;
mod db;
mod runtime;
mod state_machine;
mod telegram;

use config::BotConfig;
use db::Database;
use runtime::{DatabaseStorage, RuntimeManager};
use std::sync::Arc;
use telegram::{TelegramApi, TelegramReplySink};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "row_counter_bot=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;

    // Ensure data directory exists
    std::fs::create_dir_all(&config.data_dir)?;

    // Schema is applied on open, before any traffic
    let db_path = config.db_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path)?;

    let api = Arc::new(TelegramApi::new(&config.token, config.poll_timeout_secs)?);
    match api.username().await {
        Ok(username) => tracing::info!(username = %username, "Start listening"),
        Err(e) => tracing::warn!(error = %e, "getMe failed, polling anyway"),
    }

    let sink = Arc::new(TelegramReplySink::new(
        api.clone(),
        config.onboarding_animation.clone(),
    ));
    let manager = Arc::new(RuntimeManager::new(
        Arc::new(DatabaseStorage::new(db)),
        sink,
        config.store_timeout,
    )
    .with_idle_timeout(config.idle_timeout));

    let cancel = CancellationToken::new();
    let polling = tokio::spawn(telegram::run_polling(
        api,
        manager,
        config.poll_timeout_secs,
        cancel.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    cancel.cancel();
    polling.await?;

    Ok(())
}
