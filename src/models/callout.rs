//! Callout model.
//!
//! A callout is a pre-declared unavailability window for a client or
//! therapist: an inclusive date range plus an intra-day time window.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::time::TimeRange;

/// Which kind of entity a callout targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalloutTarget {
    Client,
    Therapist,
}

/// An unavailability window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Callout {
    /// Unique callout identifier.
    pub id: String,
    /// Entity kind.
    pub target: CalloutTarget,
    /// Identifier of the targeted client or therapist.
    pub entity_id: String,
    /// First affected date (inclusive).
    pub start_date: NaiveDate,
    /// Last affected date (inclusive).
    pub end_date: NaiveDate,
    /// Intra-day unavailable window.
    pub window: TimeRange,
    /// Optional reason for display.
    pub reason: Option<String>,
}

impl Callout {
    /// Creates a single-day callout.
    pub fn new(
        id: impl Into<String>,
        target: CalloutTarget,
        entity_id: impl Into<String>,
        date: NaiveDate,
        window: TimeRange,
    ) -> Self {
        Self {
            id: id.into(),
            target,
            entity_id: entity_id.into(),
            start_date: date,
            end_date: date,
            window,
            reason: None,
        }
    }

    /// Extends the callout through `end_date`.
    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = end_date;
        self
    }

    /// Sets the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Whether the callout covers the given date.
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Whether the callout applies to an entity on a date and overlaps a span.
    pub fn blocks(
        &self,
        target: CalloutTarget,
        entity_id: &str,
        date: NaiveDate,
        span: &TimeRange,
    ) -> bool {
        self.target == target
            && self.entity_id == entity_id
            && self.covers_date(date)
            && self.window.overlaps(span)
    }
}
