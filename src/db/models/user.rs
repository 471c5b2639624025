use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Subscription;

/// Everything stored about one chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
    /// Slots already announced to this user. Entries never expire.
    #[serde(default)]
    pub notified: BTreeSet<NaiveDateTime>,
}

impl UserRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            subscriptions: Vec::new(),
            notified: BTreeSet::new(),
        }
    }

    /// Returns `false` when an equal subscription is already present.
    pub fn add_subscription(&mut self, subscription: Subscription) -> bool {
        if self.subscriptions.contains(&subscription) {
            return false;
        }
        self.subscriptions.push(subscription);
        true
    }

    /// Returns `false` when no equal subscription exists.
    pub fn remove_subscription(&mut self, subscription: &Subscription) -> bool {
        match self.subscriptions.iter().position(|s| s == subscription) {
            Some(index) => {
                self.subscriptions.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn mark_notified<'a>(&mut self, slots: impl IntoIterator<Item = &'a NaiveDateTime>) {
        self.notified.extend(slots);
    }

    pub fn render_subscriptions(&self) -> String {
        if self.subscriptions.is_empty() {
            return "no subscriptions".to_string();
        }
        self.subscriptions
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn duplicate_subscriptions_are_suppressed() {
        let mut user = UserRecord::new("42");
        let sub = Subscription::parse("Mon 16:00").unwrap();
        assert!(user.add_subscription(sub));
        assert!(!user.add_subscription(sub));
        assert_eq!(user.subscriptions.len(), 1);
    }

    #[test]
    fn removal_is_by_value() {
        let mut user = UserRecord::new("42");
        user.add_subscription(Subscription::parse("Mon 16:00").unwrap());
        user.add_subscription(Subscription::parse("Tue 18:00 2").unwrap());

        assert!(!user.remove_subscription(&Subscription::parse("Tue 18:00").unwrap()));
        assert!(user.remove_subscription(&Subscription::parse("tuesday 18:00 2").unwrap()));
        assert_eq!(user.render_subscriptions(), "Mon 16:00-17:00");
    }

    #[test]
    fn renders_empty_marker() {
        assert_eq!(UserRecord::new("42").render_subscriptions(), "no subscriptions");
    }

    #[test]
    fn mark_notified_is_idempotent() {
        let slot = NaiveDate::from_ymd_opt(2022, 2, 14)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap();
        let mut user = UserRecord::new("42");
        user.mark_notified([&slot]);
        user.mark_notified([&slot]);
        assert_eq!(user.notified.len(), 1);
    }
}
