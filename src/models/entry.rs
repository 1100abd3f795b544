//! Schedule entry model.
//!
//! An entry books one therapist (and usually one client) for a span of
//! the day. Lunch and admin entries carry no client.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::client::AhKind;
use crate::time::{Minutes, TimeRange};

/// What a schedule entry delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionKind {
    /// Applied Behavior Analysis session.
    Aba,
    /// Occupational-therapy allied-health session.
    AhOt,
    /// Speech-language allied-health session.
    AhSlp,
    /// Lunch break.
    IndirectTime,
    /// Administrative time.
    AdminTime,
}

impl SessionKind {
    /// Whether the kind counts toward billable work.
    pub fn is_billable(&self) -> bool {
        matches!(self, SessionKind::Aba | SessionKind::AhOt | SessionKind::AhSlp)
    }

    /// The allied-health discipline, if this is an AH kind.
    pub fn ah_kind(&self) -> Option<AhKind> {
        match self {
            SessionKind::AhOt => Some(AhKind::Ot),
            SessionKind::AhSlp => Some(AhKind::Slp),
            _ => None,
        }
    }
}

impl From<AhKind> for SessionKind {
    fn from(kind: AhKind) -> Self {
        match kind {
            AhKind::Ot => SessionKind::AhOt,
            AhKind::Slp => SessionKind::AhSlp,
        }
    }
}

/// One booked span of a therapist's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Unique entry identifier (fresh and opaque per run).
    pub id: String,
    /// Client identifier; `None` for lunch and admin entries.
    pub client_id: Option<String>,
    /// Therapist identifier.
    pub therapist_id: String,
    /// Weekday the entry falls on.
    pub weekday: Weekday,
    /// Start minute (inclusive).
    pub start: Minutes,
    /// End minute (exclusive).
    pub end: Minutes,
    /// Session kind.
    pub kind: SessionKind,
}

impl ScheduleEntry {
    /// Creates a client-bearing entry.
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        therapist_id: impl Into<String>,
        weekday: Weekday,
        start: Minutes,
        end: Minutes,
        kind: SessionKind,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: Some(client_id.into()),
            therapist_id: therapist_id.into(),
            weekday,
            start,
            end,
            kind,
        }
    }

    /// Creates a lunch entry.
    pub fn lunch(
        id: impl Into<String>,
        therapist_id: impl Into<String>,
        weekday: Weekday,
        start: Minutes,
        lunch_minutes: Minutes,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: None,
            therapist_id: therapist_id.into(),
            weekday,
            start,
            end: start + lunch_minutes,
            kind: SessionKind::IndirectTime,
        }
    }

    /// Duration in minutes.
    #[inline]
    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    /// The entry's time span.
    #[inline]
    pub fn span(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }

    /// Whether two entries overlap in time on the same weekday.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.weekday == other.weekday && self.span().overlaps(&other.span())
    }

    /// Whether this is a lunch entry.
    #[inline]
    pub fn is_lunch(&self) -> bool {
        self.kind == SessionKind::IndirectTime && self.client_id.is_none()
    }

    /// Whether the entry counts toward billable work.
    #[inline]
    pub fn is_billable(&self) -> bool {
        self.kind.is_billable()
    }
}
