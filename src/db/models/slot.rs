use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Booking granularity in minutes. Every calendar slot and subscription
/// span is a whole number of these.
pub const SLOT_MINUTES: i64 = 60;

pub fn slot_duration() -> Duration {
    Duration::minutes(SLOT_MINUTES)
}

pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn minutes_since_midnight(t: NaiveDateTime) -> i64 {
    i64::from(t.hour()) * 60 + i64::from(t.minute())
}

/// Round down to the start of the slot containing `t`.
pub fn floor_to_slot(t: NaiveDateTime) -> NaiveDateTime {
    let minutes = minutes_since_midnight(t);
    midnight(t.date()) + Duration::minutes(minutes - minutes % SLOT_MINUTES)
}

/// Round up to the next slot boundary, leaving aligned timestamps unchanged.
pub fn ceil_to_slot(t: NaiveDateTime) -> NaiveDateTime {
    let floored = floor_to_slot(t);
    if floored == t {
        t
    } else {
        floored + slot_duration()
    }
}

pub fn format_slot(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// Daily window `[open_hour, close_hour)` during which slots exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

impl OpenHours {
    pub fn new(open_hour: u32, close_hour: u32) -> Self {
        Self {
            open_hour,
            close_hour,
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        (self.open_hour..self.close_hour).contains(&t.hour())
    }
}

impl Default for OpenHours {
    fn default() -> Self {
        Self::new(6, 24)
    }
}
