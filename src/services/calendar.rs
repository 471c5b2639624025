use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, warn};

use crate::db::models::{
    ceil_to_slot, floor_to_slot, format_slot, slot_duration, OpenHours, Reservation,
};

/// Remaining free courts per slot over a window of days.
///
/// A calendar is built once per refresh cycle from the full reservation
/// list and then only read; the next cycle replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calendar {
    slots: BTreeMap<NaiveDateTime, u32>,
    capacity: u32,
}

/// One row of a rendered calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotEntry {
    pub start: NaiveDateTime,
    pub free: u32,
}

impl Calendar {
    /// Every open slot in `[window_start, window_end)` at full capacity.
    pub fn empty(
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        capacity: u32,
        hours: OpenHours,
    ) -> Self {
        let mut slots = BTreeMap::new();
        let end = ceil_to_slot(window_end);
        let mut t = floor_to_slot(window_start);
        while t < end {
            if hours.contains(t) {
                slots.insert(t, capacity);
            }
            t += slot_duration();
        }
        Self { slots, capacity }
    }

    pub fn build(
        reservations: &[Reservation],
        window_start: NaiveDateTime,
        window_end: NaiveDateTime,
        capacity: u32,
        hours: OpenHours,
    ) -> Self {
        let mut calendar = Self::empty(window_start, window_end, capacity, hours);
        for reservation in reservations {
            if !reservation.is_well_formed() {
                warn!(
                    "Skipping reservation on court {} that ends before it starts: {} - {}",
                    reservation.resource_index, reservation.start, reservation.end
                );
                continue;
            }
            let (start, end) = reservation.local_span();
            calendar.book(start, end);
        }
        debug!(
            "Built calendar with {} slot(s) from {} reservation(s)",
            calendar.slots.len(),
            reservations.len()
        );
        calendar
    }

    /// Occupy one court in every slot touched by `[start, end)`.
    ///
    /// Bookings starting or ending mid-slot take the whole enclosing slot,
    /// e.g. 05:30-06:30 occupies 05:00-07:00.
    fn book(&mut self, start: NaiveDateTime, end: NaiveDateTime) {
        let end = ceil_to_slot(end);
        let mut t = floor_to_slot(start);
        while t < end {
            if let Some(free) = self.slots.get_mut(&t) {
                *free = free.saturating_sub(1);
            }
            t += slot_duration();
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Free courts at `slot`, `None` when the slot is outside the grid.
    pub fn free_at(&self, slot: NaiveDateTime) -> Option<u32> {
        self.slots.get(&slot).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, u32)> + '_ {
        self.slots.iter().map(|(t, free)| (*t, *free))
    }

    /// Whether at least one court is free for the whole of `[start, end)`.
    pub fn is_available(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        if end <= start {
            return false;
        }
        let end = ceil_to_slot(end);
        let mut t = floor_to_slot(start);
        while t < end {
            if self.free_at(t).unwrap_or(0) == 0 {
                return false;
            }
            t += slot_duration();
        }
        true
    }

    /// The slots that still have at least one free court.
    pub fn non_empty(&self) -> Calendar {
        Calendar {
            slots: self
                .slots
                .iter()
                .filter(|(_, free)| **free > 0)
                .map(|(t, free)| (*t, *free))
                .collect(),
            capacity: self.capacity,
        }
    }

    pub fn entries(&self) -> Vec<SlotEntry> {
        self.iter()
            .map(|(start, free)| SlotEntry { start, free })
            .collect()
    }

    /// Render the given slots as `YYYY-MM-DD HH:MM - <free>` lines in time order.
    /// Slots unknown to the calendar or without free courts are left out.
    pub fn render_slots(&self, slots: &BTreeSet<NaiveDateTime>) -> String {
        slots
            .iter()
            .filter_map(|t| match self.free_at(*t) {
                Some(free) if free > 0 => Some(format!("{} - {}", format_slot(*t), free)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render every slot with free courts.
    pub fn render(&self) -> String {
        self.iter()
            .filter(|(_, free)| *free > 0)
            .map(|(t, free)| format!("{} - {}", format_slot(t), free))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
