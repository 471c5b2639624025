use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::models::{floor_to_slot, midnight};
use crate::db::NotifyReport;
use crate::error::AppResult;
use crate::services::calendar::Calendar;
use crate::{AppState, LatestCalendar};

/// Outbound transport: delivers a plain-text message to an opaque user id.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send_notification(&self, user_id: &str, message: String) -> AppResult<()>;
}

/// Calendar window for a refresh at `now`: from the current slot up to
/// midnight `window_days` days later.
pub fn calendar_window(now: NaiveDateTime, window_days: u32) -> (NaiveDateTime, NaiveDateTime) {
    let start = floor_to_slot(now);
    let end = midnight(now.date()) + Duration::days(i64::from(window_days) + 1);
    (start, end)
}

/// Venue wall-clock time at `now`, in the configured offset or the host's zone.
pub fn venue_time(now: DateTime<Utc>, offset: Option<FixedOffset>) -> NaiveDateTime {
    match offset {
        Some(offset) => now.with_timezone(&offset).naive_local(),
        None => now.with_timezone(&Local).naive_local(),
    }
}

/// Drives the fetch, rebuild and notify cycle.
pub struct NotificationService<'a> {
    state: &'a Arc<AppState>,
}

impl<'a> NotificationService<'a> {
    pub fn new(state: &'a Arc<AppState>) -> Self {
        Self { state }
    }

    fn venue_now(&self) -> NaiveDateTime {
        venue_time(Utc::now(), self.state.config.venue.utc_offset())
    }

    /// Fetch reservations and publish a freshly built calendar as the latest one.
    pub async fn refresh_calendar(&self, now: NaiveDateTime) -> AppResult<Arc<Calendar>> {
        let (start, end) = calendar_window(now, self.state.config.refresh.window_days);

        let reservations = self.state.feed.fetch(start.date(), end.date()).await?;
        let calendar = Arc::new(Calendar::build(
            &reservations,
            start,
            end,
            self.state.config.venue.courts,
            self.state.config.venue.open_hours(),
        ));

        *self.state.latest.write().await = Some(LatestCalendar {
            calendar: calendar.clone(),
            refreshed_at: Utc::now(),
        });

        debug!(
            "Calendar refreshed: {} slot(s), {} with free courts",
            calendar.len(),
            calendar.non_empty().len()
        );
        Ok(calendar)
    }

    /// The most recent calendar, fetching one when no cycle has completed yet.
    pub async fn current_calendar(&self) -> AppResult<Arc<Calendar>> {
        if let Some(latest) = self.state.latest.read().await.as_ref() {
            return Ok(latest.calendar.clone());
        }
        self.refresh_calendar(self.venue_now()).await
    }

    pub async fn run_cycle(&self) -> AppResult<NotifyReport> {
        let calendar = self
            .refresh_calendar(self.venue_now())
            .await?;

        let telegram = self.state.telegram.read().await;
        let Some(notifier) = telegram.as_ref() else {
            warn!("Telegram is not configured; skipping notifications");
            return Ok(NotifyReport::default());
        };

        let report = self.state.store.notify_all(&calendar, notifier).await;
        if report.notified_users > 0 || !report.failed_users.is_empty() {
            info!(
                "Notified {} user(s) about {} slot(s), {} failed",
                report.notified_users,
                report.notified_slots,
                report.failed_users.len()
            );
        }
        Ok(report)
    }
}
