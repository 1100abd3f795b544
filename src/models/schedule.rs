//! Day schedule and violation models.
//!
//! A `DaySchedule` is a flat list of entries for one calendar date.
//! Validation and fitness speak in `Violation`s: a rule tag, a severity,
//! the entity concerned, and a human-readable message.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::entry::ScheduleEntry;
use crate::time::Minutes;

/// Constraint rules a schedule can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationRule {
    /// Therapist double-booked.
    TherapistConflict,
    /// Client double-booked.
    ClientConflict,
    /// Entry overlaps a matching callout.
    CalloutOverlap,
    /// Therapist lacks an insurance requirement of the client.
    CredentialMismatch,
    /// Therapist cannot deliver the allied-health kind.
    AhQualificationMissing,
    /// Entry duration breaks the kind's bounds.
    DurationInvalid,
    /// Entry leaves the operating window.
    OutsideOperatingHours,
    /// Same therapist and client in directly adjoining entries.
    SameClientBackToBack,
    /// More than three distinct therapists for an MD Medicaid client.
    MdMedicaidLimit,
    /// ABA session scheduled on a weekend.
    AbaOnWeekend,
    /// Working therapist without a lunch.
    MissingLunch,
    /// Working therapist with more than one lunch.
    MultipleLunches,
    /// Lunch outside the lunch window.
    LunchOutsideWindow,
    /// Teammates lunching within the same half hour.
    LunchStagger,
    /// Client left uncovered during operating hours.
    CoverageGap,
    /// Prescribed allied-health session missing from the day.
    UnmetAlliedHealth,
    /// Allied-health session placed outside its preferred window.
    AhOutsidePreferredWindow,
    /// Client and therapist belong to different teams.
    TeamMismatch,
    /// Therapist carrying more than four billable sessions.
    OverloadedTherapist,
    /// BCBA with no direct client time.
    BcbaNoDirectTime,
    /// Request carried no date.
    MissingDate,
    /// Request snapshot was missing a required collection.
    MissingData,
    /// Callout references an entity absent from the inputs.
    UnknownEntity,
}

/// Violation severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Breaks a schedule invariant.
    Hard,
    /// Degrades quality only.
    Soft,
}

impl ViolationRule {
    /// Stable rule identifier for caller display.
    pub fn code(&self) -> &'static str {
        match self {
            ViolationRule::TherapistConflict => "THERAPIST_CONFLICT",
            ViolationRule::ClientConflict => "CLIENT_CONFLICT",
            ViolationRule::CalloutOverlap => "CALLOUT_OVERLAP",
            ViolationRule::CredentialMismatch => "CREDENTIAL_MISMATCH",
            ViolationRule::AhQualificationMissing => "AH_QUALIFICATION_MISSING",
            ViolationRule::DurationInvalid => "DURATION_INVALID",
            ViolationRule::OutsideOperatingHours => "OUTSIDE_OPERATING_HOURS",
            ViolationRule::SameClientBackToBack => "SAME_CLIENT_BACK_TO_BACK",
            ViolationRule::MdMedicaidLimit => "MD_MEDICAID_LIMIT_VIOLATED",
            ViolationRule::AbaOnWeekend => "ABA_ON_WEEKEND",
            ViolationRule::MissingLunch => "MISSING_LUNCH",
            ViolationRule::MultipleLunches => "MULTIPLE_LUNCHES",
            ViolationRule::LunchOutsideWindow => "LUNCH_OUTSIDE_WINDOW",
            ViolationRule::LunchStagger => "LUNCH_STAGGER",
            ViolationRule::CoverageGap => "COVERAGE_GAP",
            ViolationRule::UnmetAlliedHealth => "UNMET_ALLIED_HEALTH",
            ViolationRule::AhOutsidePreferredWindow => "AH_OUTSIDE_PREFERRED_WINDOW",
            ViolationRule::TeamMismatch => "TEAM_ALIGNMENT_MISMATCH",
            ViolationRule::OverloadedTherapist => "OVERLOADED_THERAPIST",
            ViolationRule::BcbaNoDirectTime => "BCBA_NO_DIRECT_TIME",
            ViolationRule::MissingDate => "MISSING_DATE",
            ViolationRule::MissingData => "MISSING_DATA",
            ViolationRule::UnknownEntity => "UNKNOWN_ENTITY",
        }
    }

    /// Intrinsic severity of the rule.
    pub fn severity(&self) -> Severity {
        match self {
            ViolationRule::LunchOutsideWindow
            | ViolationRule::LunchStagger
            | ViolationRule::TeamMismatch
            | ViolationRule::OverloadedTherapist
            | ViolationRule::BcbaNoDirectTime
            | ViolationRule::AhOutsidePreferredWindow => Severity::Soft,
            _ => Severity::Hard,
        }
    }
}

/// A tagged constraint violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Violated rule.
    pub rule: ViolationRule,
    /// Severity (derived from the rule).
    pub severity: Severity,
    /// Identifier of the entity concerned (entry, client, or therapist).
    pub entity_id: String,
    /// Human-readable description.
    pub message: String,
    /// Optional machine-oriented detail.
    pub detail: Option<String>,
}

impl Violation {
    /// Creates a violation for a rule and entity.
    pub fn new(rule: ViolationRule, entity_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule,
            severity: rule.severity(),
            entity_id: entity_id.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Deduplication key: rule, entity, and message.
    pub fn dedup_key(&self) -> (ViolationRule, &str, &str) {
        (self.rule, &self.entity_id, &self.message)
    }
}

/// One day's roster: a date and its entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    /// Calendar date of the roster.
    pub date: NaiveDate,
    /// Schedule entries.
    pub entries: Vec<ScheduleEntry>,
}

impl DaySchedule {
    /// Creates an empty schedule for a date.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            entries: Vec::new(),
        }
    }

    /// Weekday of the schedule's date.
    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Whether the date is a Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// Adds an entry.
    pub fn add_entry(&mut self, entry: ScheduleEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the schedule has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries of one therapist.
    pub fn entries_for_therapist(&self, therapist_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.therapist_id == therapist_id)
            .collect()
    }

    /// All entries of one client.
    pub fn entries_for_client(&self, client_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.client_id.as_deref() == Some(client_id))
            .collect()
    }

    /// Billable minutes worked by one therapist.
    pub fn billable_minutes(&self, therapist_id: &str) -> Minutes {
        self.entries
            .iter()
            .filter(|e| e.therapist_id == therapist_id && e.is_billable())
            .map(|e| e.duration())
            .sum()
    }

    /// The therapist's lunch entries (a valid schedule has at most one).
    pub fn lunches_for(&self, therapist_id: &str) -> Vec<&ScheduleEntry> {
        self.entries
            .iter()
            .filter(|e| e.therapist_id == therapist_id && e.is_lunch())
            .collect()
    }

    /// Distinct therapist ids appearing in the schedule, sorted.
    pub fn therapist_ids(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.entries.iter().map(|e| e.therapist_id.as_str()).collect();
        set.into_iter().collect()
    }

    /// Distinct therapist ids serving one client, sorted.
    pub fn therapists_for_client(&self, client_id: &str) -> Vec<&str> {
        let set: BTreeSet<&str> = self
            .entries
            .iter()
            .filter(|e| e.client_id.as_deref() == Some(client_id))
            .map(|e| e.therapist_id.as_str())
            .collect();
        set.into_iter().collect()
    }
}
