//! Client model.
//!
//! A client receives a full day of ABA coverage plus any allied-health
//! sessions their care plan prescribes. Insurance requirements are
//! qualification tags every assigned therapist must carry; the
//! `"MD_MEDICAID"` tag additionally caps the client at three distinct
//! therapists per day.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::time::TimeRange;

/// Qualification tag that activates the distinct-therapist cap.
pub const MD_MEDICAID: &str = "MD_MEDICAID";

/// Allied-health discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AhKind {
    /// Occupational therapy.
    Ot,
    /// Speech-language pathology.
    Slp,
}

impl AhKind {
    /// Certificate qualification a therapist needs to deliver this kind.
    pub fn certificate(&self) -> &'static str {
        match self {
            AhKind::Ot => "OT Certified",
            AhKind::Slp => "SLP Certified",
        }
    }
}

/// One allied-health prescription on a client's care plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlliedHealthNeed {
    /// Discipline.
    pub kind: AhKind,
    /// Sessions per week.
    pub frequency_per_week: u32,
    /// Session length in minutes.
    pub duration_minutes: i32,
    /// Preferred time-of-day window, if any.
    pub preferred_window: Option<TimeRange>,
    /// Weekdays on which the session may run. `None` = any weekday.
    pub weekdays: Option<Vec<Weekday>>,
}

impl AlliedHealthNeed {
    /// Creates a need with one session per week.
    pub fn new(kind: AhKind, duration_minutes: i32) -> Self {
        Self {
            kind,
            frequency_per_week: 1,
            duration_minutes,
            preferred_window: None,
            weekdays: None,
        }
    }

    /// Sets the weekly frequency.
    pub fn with_frequency(mut self, per_week: u32) -> Self {
        self.frequency_per_week = per_week;
        self
    }

    /// Sets the preferred window.
    pub fn with_preferred_window(mut self, window: TimeRange) -> Self {
        self.preferred_window = Some(window);
        self
    }

    /// Restricts the need to specific weekdays.
    pub fn with_weekdays(mut self, weekdays: Vec<Weekday>) -> Self {
        self.weekdays = Some(weekdays);
        self
    }

    /// Whether the need may be scheduled on the given weekday.
    pub fn allows_weekday(&self, weekday: Weekday) -> bool {
        match &self.weekdays {
            None => true,
            Some(days) => days.contains(&weekday),
        }
    }
}

/// A client on the day's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Team identifier, if the client belongs to one.
    pub team: Option<String>,
    /// Qualification tags every assigned therapist must possess.
    pub insurance_requirements: Vec<String>,
    /// Allied-health prescriptions.
    pub allied_health_needs: Vec<AlliedHealthNeed>,
}

impl Client {
    /// Creates a new client.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            team: None,
            insurance_requirements: Vec::new(),
            allied_health_needs: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the team.
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Adds an insurance requirement tag.
    pub fn with_requirement(mut self, tag: impl Into<String>) -> Self {
        self.insurance_requirements.push(tag.into());
        self
    }

    /// Adds an allied-health need.
    pub fn with_allied_health(mut self, need: AlliedHealthNeed) -> Self {
        self.allied_health_needs.push(need);
        self
    }

    /// Whether the client carries the Medicaid therapist cap.
    pub fn is_md_medicaid(&self) -> bool {
        self.insurance_requirements.iter().any(|t| t == MD_MEDICAID)
    }
}
