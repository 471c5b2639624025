use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One booking as reported by the upstream feed, covering `[start, end)`.
///
/// The feed carries more fields (titles, rates, statuses); only the ones
/// needed for availability are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    #[serde(rename = "resourceId")]
    pub resource_index: i64,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Reservation {
    /// Venue wall-clock span of the booking.
    pub fn local_span(&self) -> (NaiveDateTime, NaiveDateTime) {
        (self.start.naive_local(), self.end.naive_local())
    }

    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }
}
