use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use config::Config;
use db::Store;
use services::{
    calendar::Calendar,
    feed::{BookingFeed, HttpBookingFeed},
    init,
    telegram::TelegramService,
};

/// The calendar built by the most recent successful refresh.
pub struct LatestCalendar {
    pub calendar: Arc<Calendar>,
    pub refreshed_at: DateTime<Utc>,
}

pub struct AppState {
    pub config: Config,
    pub store: Arc<Store>,
    pub feed: Arc<dyn BookingFeed>,
    pub telegram: Arc<RwLock<Option<TelegramService>>>,
    pub latest: RwLock<Option<LatestCalendar>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "court_watch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting Court Watch");

    let store = init::init_store(&config).await?;
    let feed = HttpBookingFeed::new(&config.feed)?;

    let app_state = Arc::new(AppState {
        config: config.clone(),
        store: Arc::new(store),
        feed: Arc::new(feed),
        telegram: Arc::new(RwLock::new(None)),
        latest: RwLock::new(None),
    });

    init::initialize_optional_integrations(&app_state).await;

    // Create shutdown notifier for background workers
    let (shutdown_tx, _shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    let bg_handles = init::spawn_background_workers(app_state.clone(), shutdown_tx.clone());

    let bot = {
        let telegram = app_state.telegram.read().await;
        telegram
            .as_ref()
            .map(|telegram| telegram.spawn_dispatcher(app_state.clone()))
    };

    let app = routes::router(app_state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(listener, app);

    let shutdown_tx_clone = shutdown_tx.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received, notifying background workers");
        let _ = shutdown_tx_clone.send(());
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Signal handler completed; server future dropped to stop accepting new connections");
        }
    }

    if let Some((token, handle)) = bot {
        match token.shutdown() {
            Ok(stopping) => stopping.await,
            Err(e) => tracing::debug!("Telegram dispatcher was not running: {:?}", e),
        }
        let _ = handle.await;
    }

    // Give the refresh worker time to finish an in-flight cycle.
    let shutdown_wait = Duration::from_secs(15);
    tracing::info!(
        "Waiting up to {}s for background workers to exit",
        shutdown_wait.as_secs()
    );

    let bg_wait = async {
        for h in bg_handles {
            let _ = h.await;
        }
    };
    let _ = tokio::time::timeout(shutdown_wait, bg_wait).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
