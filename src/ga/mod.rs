//! Evolutionary optimization over roster individuals.
//!
//! The genome is the schedule itself: each individual owns its entry
//! list. Operators act directly on entries — slot-granular slide/resize
//! mutations and a therapist-partition crossover — with the constraint
//! kernel as the acceptance gate, so the population drifts toward
//! feasibility instead of being repaired from scratch each generation.
//!
//! # Submodules
//!
//! - [`individual`]: the population member type
//! - [`operators`]: mutation and crossover
//! - [`fitness`]: the adaptive weighted penalty

pub mod fitness;
pub mod individual;
pub mod operators;

pub use fitness::FitnessEvaluator;
pub use individual::RosterIndividual;
pub use operators::{mutate, partition_crossover};
