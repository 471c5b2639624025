use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::db::models::slot::SLOT_MINUTES;
use crate::error::ValidationError;

lazy_static::lazy_static! {
    static ref WEEKDAYS: HashMap<&'static str, Weekday> = HashMap::from([
        ("mon", Weekday::Mon),
        ("monday", Weekday::Mon),
        ("tue", Weekday::Tue),
        ("tuesday", Weekday::Tue),
        ("wed", Weekday::Wed),
        ("wednesday", Weekday::Wed),
        ("thu", Weekday::Thu),
        ("thursday", Weekday::Thu),
        ("fri", Weekday::Fri),
        ("friday", Weekday::Fri),
        ("sat", Weekday::Sat),
        ("saturday", Weekday::Sat),
        ("sun", Weekday::Sun),
        ("sunday", Weekday::Sun),
    ]);
}

/// Wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clock {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for Clock {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ValidationError::BadTimeFormat(s.to_string());

        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());

        let (hour, minute) = s.split_once(':').ok_or_else(bad)?;
        if !two_digits(hour) || !two_digits(minute) {
            return Err(bad());
        }
        let hour: u32 = hour.parse().map_err(|_| bad())?;
        let minute: u32 = minute.parse().map_err(|_| bad())?;
        if hour > 23 || minute > 59 {
            return Err(bad());
        }

        Ok(Clock { hour, minute })
    }
}

/// A recurring weekly preference: "every `weekday` at `start`, for
/// `duration` slots".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub weekday: Weekday,
    #[serde(flatten)]
    pub start: Clock,
    /// Length of the requested span in slot units, at least 1.
    pub duration: u32,
}

impl Subscription {
    /// Parse `"<weekday> <HH:MM> [duration]"`, e.g. `"Wed 16:00 2"`.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let normalized = input.trim().to_lowercase();
        let tokens: Vec<&str> = normalized.split(' ').collect();
        if normalized.is_empty() || !(2..=3).contains(&tokens.len()) {
            return Err(ValidationError::BadFormat);
        }

        let weekday = *WEEKDAYS
            .get(tokens[0])
            .ok_or_else(|| ValidationError::UnknownWeekday(tokens[0].to_string()))?;

        let start: Clock = tokens[1].parse()?;

        let duration = match tokens.get(2) {
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n >= 1 => {
                    u32::try_from(n).map_err(|_| ValidationError::BadDuration(raw.to_string()))?
                }
                _ => return Err(ValidationError::BadDuration(raw.to_string())),
            },
            None => 1,
        };

        Ok(Subscription {
            weekday,
            start,
            duration,
        })
    }

    fn end_minutes(&self) -> i64 {
        i64::from(self.start.hour) * 60
            + i64::from(self.start.minute)
            + i64::from(self.duration) * SLOT_MINUTES
    }
}

impl FromStr for Subscription {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subscription::parse(s)
    }
}

// Spans running past midnight print hours of 24 and above.
impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.end_minutes();
        write!(
            f,
            "{} {:02}:{:02}-{:02}:{:02}",
            self.weekday,
            self.start.hour,
            self.start.minute,
            end / 60,
            end % 60
        )
    }
}
