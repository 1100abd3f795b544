//! Roster domain models.
//!
//! Core data types for the clinic day-roster problem: who is scheduled
//! (clients, therapists, teams), what blocks scheduling (callouts), and
//! what a solution looks like (entries, day schedules, violations).

mod base_schedule;
mod callout;
mod client;
mod entry;
mod schedule;
mod team;
mod therapist;

pub use base_schedule::BaseSchedule;
pub use callout::{Callout, CalloutTarget};
pub use client::{AhKind, AlliedHealthNeed, Client, MD_MEDICAID};
pub use entry::{ScheduleEntry, SessionKind};
pub use schedule::{DaySchedule, Severity, Violation, ViolationRule};
pub use team::Team;
pub use therapist::{Role, Therapist};
