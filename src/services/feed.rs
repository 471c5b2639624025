use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;

use crate::config::FeedConfig;
use crate::db::models::Reservation;
use crate::error::{AppError, AppResult};

const DATE_LAYOUT: &str = "%Y-%m-%d";

/// Source of reservations for a date range.
#[async_trait]
pub trait BookingFeed: Send + Sync + 'static {
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Reservation>>;
}

/// Booking feed served over HTTP as a JSON array of reservations.
#[derive(Clone)]
pub struct HttpBookingFeed {
    client: Client,
    url: String,
}

impl HttpBookingFeed {
    pub fn new(config: &FeedConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl BookingFeed for HttpBookingFeed {
    async fn fetch(&self, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<Reservation>> {
        let start = start.format(DATE_LAYOUT).to_string();
        let end = end.format(DATE_LAYOUT).to_string();
        tracing::debug!("Fetching bookings from {} ({} to {})", self.url, start, end);

        let response = self
            .client
            .get(&self.url)
            .query(&[("start", start.as_str()), ("end", end.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamFetch(format!(
                "Booking feed returned {}: {}",
                status, error_text
            )));
        }

        let reservations: Vec<Reservation> = response.json().await.map_err(|e| {
            AppError::UpstreamFetch(format!("Failed to parse booking feed response: {}", e))
        })?;

        tracing::info!("Fetched {} booking(s)", reservations.len());
        Ok(reservations)
    }
}
