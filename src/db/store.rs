use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::models::{Subscription, UserRecord};
use crate::error::{AppError, AppResult, ValidationError};
use crate::services::calendar::Calendar;
use crate::services::matcher::matching_slots_for_user;
use crate::services::notifications::Notifier;

/// Persisted snapshot of every user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

/// Outcome of one `notify_all` pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    pub notified_users: usize,
    pub notified_slots: usize,
    pub failed_users: Vec<String>,
}

/// Durable repository of subscriptions and notification history.
///
/// Readers share the lock; writers hold it exclusively through the
/// snapshot write, so a completed call is already on disk.
pub struct Store {
    path: PathBuf,
    data: RwLock<StoreData>,
}

fn require_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.trim().is_empty() {
        return Err(ValidationError::EmptyUserId);
    }
    Ok(())
}

impl Store {
    /// Load the store at `path`, starting empty when the file is missing or blank.
    pub async fn open(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => StoreData::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Loaded {} user(s) from {}",
            data.users.len(),
            path.display()
        );

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the whole snapshot. Callers hold the write lock.
    async fn persist(&self, data: &StoreData) -> AppResult<()> {
        let mut raw = serde_json::to_string_pretty(data)?;
        raw.push('\n');

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Register `text` as a subscription for `user_id`, creating the user if needed.
    ///
    /// Subscribing to an already stored pattern is a no-op apart from the save.
    pub async fn subscribe(&self, user_id: &str, text: &str) -> AppResult<Subscription> {
        require_user_id(user_id)?;
        let subscription = Subscription::parse(text)?;

        let mut data = self.data.write().await;
        let user = data
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id));
        if user.add_subscription(subscription) {
            debug!("User {} subscribed to {}", user_id, subscription);
        } else {
            debug!("User {} already subscribed to {}", user_id, subscription);
        }

        self.persist(&data).await?;
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, user_id: &str, text: &str) -> AppResult<Subscription> {
        require_user_id(user_id)?;
        let subscription = Subscription::parse(text)?;

        let mut data = self.data.write().await;
        let user = data
            .users
            .get_mut(user_id)
            .ok_or_else(AppError::user_not_found)?;
        if !user.remove_subscription(&subscription) {
            return Err(AppError::subscription_not_found());
        }
        debug!("User {} unsubscribed from {}", user_id, subscription);

        self.persist(&data).await?;
        Ok(subscription)
    }

    /// One rendered subscription per line, `"no subscriptions"` for a user
    /// without any, and an empty string for an unknown user.
    pub async fn list_subscriptions(&self, user_id: &str) -> String {
        let data = self.data.read().await;
        data.users
            .get(user_id)
            .map(UserRecord::render_subscriptions)
            .unwrap_or_default()
    }

    /// Erase everything known about `user_id`. Unknown users are not an error.
    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        let mut data = self.data.write().await;
        if data.users.remove(user_id).is_some() {
            info!("Deleted user {}", user_id);
        }
        self.persist(&data).await
    }

    /// Record `slots` as announced to `user_id`.
    ///
    /// Returns `false` without touching storage when the user no longer exists.
    pub async fn mark_notified(
        &self,
        user_id: &str,
        slots: &BTreeSet<NaiveDateTime>,
    ) -> AppResult<bool> {
        let mut data = self.data.write().await;
        let Some(user) = data.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.mark_notified(slots);
        self.persist(&data).await?;
        Ok(true)
    }

    pub async fn user_count(&self) -> usize {
        self.data.read().await.users.len()
    }

    /// Tell every user about newly free slots matching their subscriptions.
    ///
    /// Pending slots are computed under the read lock; sends happen with no
    /// lock held. A failed send leaves that user's history untouched so the
    /// same slots are retried next cycle, and never stops the other users.
    pub async fn notify_all(&self, calendar: &Calendar, notifier: &dyn Notifier) -> NotifyReport {
        let pending: Vec<(String, BTreeSet<NaiveDateTime>)> = {
            let data = self.data.read().await;
            data.users
                .values()
                .filter_map(|user| {
                    let slots = matching_slots_for_user(calendar, user);
                    (!slots.is_empty()).then(|| (user.id.clone(), slots))
                })
                .collect()
        };

        let mut report = NotifyReport::default();

        for (user_id, slots) in pending {
            let message = format!(
                "New booking available:\n{}",
                calendar.render_slots(&slots)
            );

            if let Err(e) = notifier.send_notification(&user_id, message).await {
                warn!("Could not notify user {}: {}", user_id, e);
                report.failed_users.push(user_id);
                continue;
            }

            match self.mark_notified(&user_id, &slots).await {
                Ok(true) => {
                    report.notified_users += 1;
                    report.notified_slots += slots.len();
                }
                Ok(false) => {
                    debug!("User {} was deleted while being notified", user_id);
                }
                Err(e) => {
                    warn!(
                        "Notified user {} but failed to save notification history: {}",
                        user_id, e
                    );
                    report.failed_users.push(user_id);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    use crate::db::models::{OpenHours, Reservation};

    impl Store {
        pub(crate) async fn user(&self, user_id: &str) -> Option<UserRecord> {
            self.data.read().await.users.get(user_id).cloned()
        }

        pub(crate) async fn snapshot(&self) -> StoreData {
            self.data.read().await.clone()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_notification(&self, user_id: &str, message: String) -> AppResult<()> {
            if self.failing.iter().any(|f| f == user_id) {
                return Err(AppError::Telegram("chat not found".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), message));
            Ok(())
        }
    }

    impl RecordingNotifier {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    // 2022-02-14 is a Monday.
    fn monday(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 2, 14)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn monday_calendar(booked_hours: &[u32]) -> Calendar {
        let reservations: Vec<Reservation> = booked_hours
            .iter()
            .map(|h| Reservation {
                resource_index: 1,
                start: DateTime::parse_from_rfc3339(&format!("2022-02-14T{h:02}:00:00+13:00"))
                    .unwrap(),
                end: DateTime::parse_from_rfc3339(&format!(
                    "2022-02-14T{:02}:00:00+13:00",
                    h + 1
                ))
                .unwrap(),
            })
            .collect();
        Calendar::build(&reservations, monday(6), monday(22), 1, OpenHours::default())
    }

    async fn store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("data").join("subscriptions.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn opens_empty_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        assert_eq!(s.user_count().await, 0);
        assert_eq!(s.list_subscriptions("1").await, "");
    }

    #[tokio::test]
    async fn opens_empty_when_file_blank() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("subscriptions.json");
        std::fs::write(&path, "").unwrap();
        let s = Store::open(&path).await.unwrap();
        assert_eq!(s.user_count().await, 0);
    }

    #[tokio::test]
    async fn subscribe_creates_user_and_suppresses_duplicates() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;

        assert_ok!(s.subscribe("1", "Mon 16:00").await);
        assert_ok!(s.subscribe("1", "monday 16:00 1").await);

        let user = s.user("1").await.unwrap();
        assert_eq!(user.subscriptions.len(), 1);
        assert!(user.notified.is_empty());
        assert_eq!(s.list_subscriptions("1").await, "Mon 16:00-17:00");
    }

    #[tokio::test]
    async fn subscribe_rejects_blank_user_and_bad_pattern() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;

        assert!(matches!(
            s.subscribe("  ", "Mon 16:00").await,
            Err(AppError::Validation(ValidationError::EmptyUserId))
        ));
        assert!(matches!(
            s.subscribe("1", "Mondey 16:00").await,
            Err(AppError::Validation(ValidationError::UnknownWeekday(_)))
        ));
        assert_eq!(s.user_count().await, 0);
        assert!(!s.path().exists());
    }

    #[tokio::test]
    async fn unsubscribe_reports_missing_user_and_subscription() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;

        let err = assert_err!(s.unsubscribe("1", "Mon 16:00").await);
        assert!(matches!(err, AppError::NotFound(ref m) if m == "user not found"));

        s.subscribe("1", "Mon 16:00").await.unwrap();
        let err = assert_err!(s.unsubscribe("1", "Mon 16:00 2").await);
        assert!(matches!(err, AppError::NotFound(ref m) if m == "subscription not found"));

        assert_ok!(s.unsubscribe("1", "Mon 16:00").await);
        assert_eq!(s.list_subscriptions("1").await, "no subscriptions");
    }

    #[tokio::test]
    async fn mutations_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let s = store(&dir).await;
            s.subscribe("1", "Mon 16:00 2").await.unwrap();
            s.subscribe("2", "Sat 09:00").await.unwrap();
            s.mark_notified("1", &BTreeSet::from([monday(16)]))
                .await
                .unwrap();
            s.delete_user("2").await.unwrap();
        }

        let reopened = store(&dir).await;
        assert_eq!(reopened.user_count().await, 1);
        let user = reopened.user("1").await.unwrap();
        assert_eq!(user.subscriptions, vec![Subscription::parse("Mon 16:00 2").unwrap()]);
        assert_eq!(user.notified, BTreeSet::from([monday(16)]));
    }

    #[tokio::test]
    async fn persisted_file_is_indented_json() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        s.subscribe("1", "Wed 16:00 2").await.unwrap();

        let raw = std::fs::read_to_string(s.path()).unwrap();
        assert!(raw.contains("\n  \"users\""));
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value["users"]["1"]["subscriptions"][0],
            serde_json::json!({"weekday": "Wed", "hour": 16, "minute": 0, "duration": 2})
        );
        assert_eq!(value["users"]["1"]["notified"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn delete_unknown_user_is_ok() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        assert_ok!(s.delete_user("nobody").await);
    }

    #[tokio::test]
    async fn notify_all_reports_each_slot_once() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        s.subscribe("1", "Mon 16:00").await.unwrap();
        let notifier = RecordingNotifier::default();

        let cal = monday_calendar(&[]);
        let report = s.notify_all(&cal, &notifier).await;
        assert_eq!(report.notified_users, 1);
        assert_eq!(report.notified_slots, 1);
        assert_eq!(
            notifier.sent(),
            vec![(
                "1".to_string(),
                "New booking available:\n2022-02-14 16:00 - 1".to_string()
            )]
        );

        let report = s.notify_all(&cal, &notifier).await;
        assert_eq!(report, NotifyReport::default());
        assert_eq!(notifier.sent().len(), 1);
    }

    // Notified slots never expire: a slot that is booked and then freed
    // again is not announced a second time.
    #[tokio::test]
    async fn notify_all_suppresses_slot_that_frees_up_again() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        s.subscribe("1", "Mon 16:00").await.unwrap();
        let notifier = RecordingNotifier::default();

        s.notify_all(&monday_calendar(&[]), &notifier).await;
        s.notify_all(&monday_calendar(&[16]), &notifier).await;
        s.notify_all(&monday_calendar(&[]), &notifier).await;

        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_send_is_isolated_and_retried() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        s.subscribe("1", "Mon 16:00").await.unwrap();
        s.subscribe("2", "Mon 17:00").await.unwrap();
        let cal = monday_calendar(&[]);

        let flaky = RecordingNotifier {
            failing: vec!["1".to_string()],
            ..Default::default()
        };
        let report = s.notify_all(&cal, &flaky).await;
        assert_eq!(report.failed_users, vec!["1".to_string()]);
        assert_eq!(report.notified_users, 1);
        assert!(s.user("1").await.unwrap().notified.is_empty());
        assert_eq!(
            s.user("2").await.unwrap().notified,
            BTreeSet::from([monday(17)])
        );

        let healthy = RecordingNotifier::default();
        let report = s.notify_all(&cal, &healthy).await;
        assert_eq!(report.notified_users, 1);
        assert_eq!(healthy.sent()[0].0, "1");
    }

    #[tokio::test]
    async fn mark_notified_does_not_recreate_deleted_user() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir).await;
        let marked = s
            .mark_notified("ghost", &BTreeSet::from([monday(16)]))
            .await
            .unwrap();
        assert!(!marked);
        assert!(s.user("ghost").await.is_none());
    }

    #[tokio::test]
    async fn concurrent_writes_converge_to_serial_state() {
        let dir = TempDir::new().unwrap();
        let s = Arc::new(store(&dir).await);
        let hours: Vec<u32> = (6..22).collect();

        let mut handles = Vec::new();
        for hour in hours.clone() {
            let s = s.clone();
            handles.push(tokio::spawn(async move {
                let pattern = format!("Mon {hour:02}:00");
                s.subscribe("1", &pattern).await.unwrap();
                if hour % 2 == 0 {
                    s.unsubscribe("1", &pattern).await.unwrap();
                }
                s.subscribe("2", "Tue 10:00").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let user = s.user("1").await.unwrap();
        let mut kept: Vec<u32> = user.subscriptions.iter().map(|sub| sub.start.hour).collect();
        kept.sort_unstable();
        let expected: Vec<u32> = hours.into_iter().filter(|h| h % 2 == 1).collect();
        assert_eq!(kept, expected);
        assert_eq!(s.user("2").await.unwrap().subscriptions.len(), 1);

        let on_disk: StoreData =
            serde_json::from_str(&std::fs::read_to_string(s.path()).unwrap()).unwrap();
        assert_eq!(on_disk, s.snapshot().await);
    }
}
