//! Initialization helpers for the application:
//! - the subscription store
//! - the optional Telegram integration
//! - background worker spawn helpers

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::db::Store;
use crate::services::notifications::NotificationService;

/// Open the subscription store at the configured path.
pub async fn init_store(config: &Config) -> Result<Store> {
    tracing::info!("Opening subscription store: {}", config.store.path.display());
    let store = Store::open(config.store.path.clone()).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to open store {}: {}",
            config.store.path.display(),
            e
        )
    })?;
    tracing::info!(
        "Subscription store ready at {} with {} user(s)",
        store.path().display(),
        store.user_count().await
    );
    Ok(store)
}

/// Initialize the Telegram bot and store it into `AppState`.
///
/// Failures are logged; the service keeps running without a transport and
/// notifications wait until a bot is available.
pub async fn initialize_optional_integrations(state: &Arc<crate::AppState>) {
    if let Some(ref token) = state.config.telegram.bot_token {
        tracing::info!("Initializing Telegram bot");
        match crate::services::telegram::TelegramService::new(token.clone()).await {
            Ok(telegram) => {
                *state.telegram.write().await = Some(telegram);
                tracing::info!("Telegram bot initialized successfully");
            }
            Err(e) => {
                tracing::warn!("Failed to initialize Telegram bot: {}", e);
            }
        }
    } else {
        tracing::warn!("TELEGRAM_BOT_TOKEN is not set; running without Telegram");
    }
}

/// Spawn the periodic refresh-and-notify worker.
///
/// Returns the `JoinHandle`s so callers can await shutdown. Workers exit on
/// the first message of the `shutdown` broadcast channel.
pub fn spawn_background_workers(
    state: Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        let interval = Duration::from_secs(state.config.refresh.interval_seconds);
        handles.push(tokio::spawn(async move {
            loop {
                tracing::debug!("Starting availability refresh");

                if let Err(e) = NotificationService::new(&state).run_cycle().await {
                    tracing::warn!("Availability refresh failed: {}", e);
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Refresh worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }));
    }

    handles
}
