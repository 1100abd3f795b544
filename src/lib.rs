//! Day-roster engine for an ABA therapy clinic.
//!
//! Given the day's clients, the therapist pool, a date, and any declared
//! unavailability (callouts), the engine produces a one-day schedule that
//! covers every client through operating hours, books the prescribed
//! allied-health sessions, and places lunches — minimizing a weighted
//! penalty over constraint violations and structural badness.
//!
//! The optimizer is constructive + evolutionary: a greedy seeder builds
//! feasible-leaning starting schedules, a genetic loop with repair
//! operators searches around them, and a therapist-swap local search
//! polishes the winner.
//!
//! # Quick Start
//!
//! ```no_run
//! use aba_roster::engine::{RosterEngine, RosterRequest};
//! use aba_roster::models::{Client, Role, Therapist};
//! use chrono::NaiveDate;
//!
//! let clients = vec![Client::new("c1").with_requirement("MD_MEDICAID")];
//! let therapists = vec![
//!     Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
//!     Therapist::new("t2", Role::Bcba).with_qualification("MD_MEDICAID"),
//! ];
//! let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
//!
//! let engine = RosterEngine::new();
//! let outcome = engine.run(&RosterRequest::new(clients, therapists, date).with_rng_seed(42));
//! println!("{}: {} entries", outcome.status, outcome.schedule.len());
//! ```
//!
//! # Modules
//!
//! - **`models`**: domain types — `Client`, `Therapist`, `Callout`,
//!   `ScheduleEntry`, `DaySchedule`, `Violation`
//! - **`engine`**: the `run` entrypoint and outcome type
//! - **`constraints`** / **`validator`** / **`coverage`**: the rule kernel
//! - **`availability`**: slot-bitmask busy tracking
//! - **`seeder`** / **`repair`** / **`ga`**: the optimizer itself
//! - **`store`** / **`learning`**: collaborator contracts
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Burke et al. (2004), "The State of the Art of Nurse Rostering"

pub mod availability;
pub mod config;
pub mod constraints;
pub mod context;
pub mod coverage;
pub mod engine;
pub mod ga;
pub mod ids;
pub mod kpi;
pub mod learning;
pub mod models;
pub mod repair;
pub mod seeder;
pub mod store;
pub mod time;
pub mod validation;
pub mod validator;

pub use config::EngineConfig;
pub use engine::{EngineOutcome, RosterEngine, RosterRequest};
pub use models::{DaySchedule, ScheduleEntry, Violation, ViolationRule};
