//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::models::Reservation;
use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::services::feed::BookingFeed;
use crate::AppState;

/// Feed returning canned reservations, or failing every fetch.
pub struct FakeFeed {
    reservations: Option<Vec<Reservation>>,
}

impl FakeFeed {
    pub fn with_json(raw: &str) -> Self {
        Self {
            reservations: Some(serde_json::from_str(raw).unwrap()),
        }
    }

    pub fn failing() -> Self {
        Self { reservations: None }
    }
}

#[async_trait]
impl BookingFeed for FakeFeed {
    async fn fetch(&self, _start: NaiveDate, _end: NaiveDate) -> AppResult<Vec<Reservation>> {
        self.reservations
            .clone()
            .ok_or_else(|| AppError::UpstreamFetch("feed is down".to_string()))
    }
}

/// App state backed by a temporary store and no Telegram bot.
/// Keep the returned directory alive for the duration of the test.
pub async fn app_state(feed: FakeFeed) -> (Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = Store::open(dir.path().join("subscriptions.json"))
        .await
        .unwrap();

    let state = Arc::new(AppState {
        config: Config::default(),
        store: Arc::new(store),
        feed: Arc::new(feed),
        telegram: Arc::new(RwLock::new(None)),
        latest: RwLock::new(None),
    });
    (state, dir)
}
