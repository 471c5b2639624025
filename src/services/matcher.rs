//! Projection of recurring subscriptions onto a concrete calendar.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::db::models::{slot_duration, Subscription, UserRecord};
use crate::services::calendar::Calendar;

/// Start slots where the whole span requested by `subscription` is free.
pub fn matching_slots(calendar: &Calendar, subscription: &Subscription) -> BTreeSet<NaiveDateTime> {
    calendar
        .iter()
        .filter(|(t, free)| {
            *free > 0
                && t.weekday() == subscription.weekday
                && t.hour() == subscription.start.hour
                && t.minute() == subscription.start.minute
        })
        .filter(|(t, _)| {
            // Spans too long to represent cannot fit in any calendar.
            let end = i32::try_from(subscription.duration)
                .ok()
                .and_then(|slots| t.checked_add_signed(slot_duration() * slots));
            end.is_some_and(|end| calendar.is_available(*t, end))
        })
        .map(|(t, _)| t)
        .collect()
}

/// Slots matching any of the user's subscriptions that the user has not
/// been told about yet.
pub fn matching_slots_for_user(calendar: &Calendar, user: &UserRecord) -> BTreeSet<NaiveDateTime> {
    user.subscriptions
        .iter()
        .flat_map(|subscription| matching_slots(calendar, subscription))
        .filter(|t| !user.notified.contains(t))
        .collect()
}
