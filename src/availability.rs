//! Slot-mask availability tracking.
//!
//! Keeps one fixed-width bitmask per therapist and per client, one bit
//! per 15-minute slot of the operating window. Range queries are a
//! single AND, bookings a single OR; the hot path allocates nothing.
//!
//! The word is `u128`, enough for a 32-hour window at 15-minute pitch;
//! `EngineConfig::validate` rejects anything wider.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::config::EngineConfig;
use crate::models::{Callout, CalloutTarget, ScheduleEntry};
use crate::time::Minutes;

/// Bits `[0, len)` set.
#[inline]
fn low_bits(len: usize) -> u128 {
    if len >= 128 {
        u128::MAX
    } else {
        (1u128 << len) - 1
    }
}

/// Mask with one bit per slot overlapped by `[start, end)`.
pub fn range_mask(config: &EngineConfig, start: Minutes, end: Minutes) -> u128 {
    if end <= start {
        return 0;
    }
    let first = config.slot_of(start);
    // Any partial trailing slot still occupies its slot.
    let last = config.slot_of(end - 1);
    let len = last + 1 - first;
    low_bits(len) << first
}

/// Recorded booking of one entry, for efficient ignore-one queries.
#[derive(Debug, Clone)]
struct Booking {
    therapist_id: String,
    client_id: Option<String>,
    mask: u128,
}

/// Busy-slot tracker for all therapists and clients of a run.
#[derive(Debug, Clone)]
pub struct AvailabilityTracker {
    config: EngineConfig,
    therapist_busy: HashMap<String, u128>,
    client_busy: HashMap<String, u128>,
    bookings: HashMap<String, Booking>,
}

impl AvailabilityTracker {
    /// Creates an empty tracker.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            therapist_busy: HashMap::new(),
            client_busy: HashMap::new(),
            bookings: HashMap::new(),
        }
    }

    /// Clears all masks, then books every callout and entry.
    pub fn rebuild(&mut self, entries: &[ScheduleEntry], callouts: &[Callout], date: NaiveDate) {
        self.therapist_busy.clear();
        self.client_busy.clear();
        self.bookings.clear();

        for callout in callouts {
            if !callout.covers_date(date) {
                continue;
            }
            let mask = range_mask(&self.config, callout.window.start, callout.window.end);
            match callout.target {
                CalloutTarget::Therapist => {
                    *self.therapist_busy.entry(callout.entity_id.clone()).or_insert(0) |= mask;
                }
                CalloutTarget::Client => {
                    *self.client_busy.entry(callout.entity_id.clone()).or_insert(0) |= mask;
                }
            }
        }

        for entry in entries {
            self.book_entry(entry);
        }
    }

    /// Books an entry into its therapist (and client) masks.
    pub fn book_entry(&mut self, entry: &ScheduleEntry) {
        let mask = range_mask(&self.config, entry.start, entry.end);
        *self
            .therapist_busy
            .entry(entry.therapist_id.clone())
            .or_insert(0) |= mask;
        if let Some(client_id) = &entry.client_id {
            *self.client_busy.entry(client_id.clone()).or_insert(0) |= mask;
        }
        self.bookings.insert(
            entry.id.clone(),
            Booking {
                therapist_id: entry.therapist_id.clone(),
                client_id: entry.client_id.clone(),
                mask,
            },
        );
    }

    /// Books a raw span without an entry id.
    pub fn book(&mut self, therapist_id: &str, client_id: Option<&str>, start: Minutes, end: Minutes) {
        let mask = range_mask(&self.config, start, end);
        *self
            .therapist_busy
            .entry(therapist_id.to_string())
            .or_insert(0) |= mask;
        if let Some(client_id) = client_id {
            *self.client_busy.entry(client_id.to_string()).or_insert(0) |= mask;
        }
    }

    /// Busy mask of one entity, minus an optionally ignored entry.
    fn busy_mask(&self, target: CalloutTarget, id: &str, ignore: Option<&str>) -> u128 {
        let mut mask = match target {
            CalloutTarget::Therapist => self.therapist_busy.get(id).copied().unwrap_or(0),
            CalloutTarget::Client => self.client_busy.get(id).copied().unwrap_or(0),
        };
        if let Some(ignored_id) = ignore {
            if let Some(booking) = self.bookings.get(ignored_id) {
                let applies = match target {
                    CalloutTarget::Therapist => booking.therapist_id == id,
                    CalloutTarget::Client => booking.client_id.as_deref() == Some(id),
                };
                if applies {
                    mask &= !booking.mask;
                }
            }
        }
        mask
    }

    /// Whether an entity is free over `[start, end)`.
    pub fn available(
        &self,
        target: CalloutTarget,
        id: &str,
        start: Minutes,
        end: Minutes,
        ignore: Option<&str>,
    ) -> bool {
        let query = range_mask(&self.config, start, end);
        self.busy_mask(target, id, ignore) & query == 0
    }

    /// Whether both a therapist and (optionally) a client are free.
    pub fn pair_available(
        &self,
        therapist_id: &str,
        client_id: Option<&str>,
        start: Minutes,
        end: Minutes,
        ignore: Option<&str>,
    ) -> bool {
        if !self.available(CalloutTarget::Therapist, therapist_id, start, end, ignore) {
            return false;
        }
        match client_id {
            Some(client_id) => self.available(CalloutTarget::Client, client_id, start, end, ignore),
            None => true,
        }
    }
}
