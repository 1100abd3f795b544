//! Engine configuration.
//!
//! Bundles the clinic's operational constants (operating window, lunch
//! window, session durations) with the evolutionary-search parameters.
//! Hosts adjust these before invoking the engine; `validate` catches
//! configurations the slot arithmetic cannot represent.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::{Minutes, SLOT_MINUTES, on_grid};

/// Maximum representable slot count (one mask word).
pub const MAX_SLOTS: usize = 128;

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A window bound is off the 15-minute grid.
    #[error("{0} ({1} min) is not on the 15-minute grid")]
    OffGrid(&'static str, Minutes),
    /// A window is empty or inverted.
    #[error("{0} window is empty or inverted")]
    EmptyWindow(&'static str),
    /// The operating window needs more slots than a mask word holds.
    #[error("operating window spans {0} slots, maximum is {MAX_SLOTS}")]
    TooManySlots(usize),
    /// A GA parameter is outside its meaningful range.
    #[error("invalid search parameter: {0}")]
    BadSearchParameter(&'static str),
}

/// Operational constants and search parameters for one engine run.
///
/// Defaults follow clinic practice: operating 08:00–17:00, lunches
/// starting in 11:30–13:00, ABA sessions of 1–3 hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Operating-window start (minutes since midnight).
    pub op_start: Minutes,
    /// Operating-window end (exclusive).
    pub op_end: Minutes,
    /// Earliest lunch start.
    pub lunch_start: Minutes,
    /// Latest lunch end.
    pub lunch_end: Minutes,
    /// Staff availability window start.
    pub staff_start: Minutes,
    /// Staff availability window end.
    pub staff_end: Minutes,
    /// Minimum ABA session length (minutes).
    pub aba_min: Minutes,
    /// Maximum ABA session length (minutes).
    pub aba_max: Minutes,
    /// Lunch length (minutes).
    pub lunch_minutes: Minutes,
    /// Billable minutes at which a therapist owes a lunch.
    pub lunch_threshold: Minutes,
    /// Population size.
    pub population_size: usize,
    /// Maximum generations.
    pub max_generations: usize,
    /// Fraction of the population copied unchanged each generation.
    pub elitism: f64,
    /// Probability of crossover (else offspring clones a parent).
    pub crossover_rate: f64,
    /// Probability that an offspring is mutated at all.
    pub mutation_rate: f64,
    /// Fraction of a mutated individual's entries that are perturbed.
    pub mutation_strength: f64,
    /// Generations without improvement before stopping.
    pub plateau: usize,
    /// Tournament size for selection.
    pub tournament_size: usize,
    /// Fraction of selections made uniformly at random.
    pub uniform_selection_rate: f64,
    /// Maximum local-search polish iterations.
    pub local_search_iterations: usize,
    /// Fitness below which the outcome counts as a success.
    pub success_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            op_start: 8 * 60,
            op_end: 17 * 60,
            lunch_start: 11 * 60 + 30,
            lunch_end: 13 * 60 + 30,
            staff_start: 7 * 60 + 30,
            staff_end: 18 * 60,
            aba_min: 60,
            aba_max: 180,
            lunch_minutes: 30,
            lunch_threshold: 300,
            population_size: 50,
            max_generations: 150,
            elitism: 0.10,
            crossover_rate: 0.7,
            mutation_rate: 0.95,
            mutation_strength: 0.10,
            plateau: 30,
            tournament_size: 5,
            uniform_selection_rate: 0.30,
            local_search_iterations: 30,
            success_threshold: 500.0,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the operating window.
    pub fn with_operating_window(mut self, start: Minutes, end: Minutes) -> Self {
        self.op_start = start;
        self.op_end = end;
        self
    }

    /// Sets the lunch window (earliest start, latest end).
    pub fn with_lunch_window(mut self, start: Minutes, end: Minutes) -> Self {
        self.lunch_start = start;
        self.lunch_end = end;
        self
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the generation cap.
    pub fn with_max_generations(mut self, n: usize) -> Self {
        self.max_generations = n;
        self
    }

    /// Sets the plateau (stagnation) limit.
    pub fn with_plateau(mut self, n: usize) -> Self {
        self.plateau = n;
        self
    }

    /// Number of 15-minute slots in the operating window.
    #[inline]
    pub fn num_slots(&self) -> usize {
        ((self.op_end - self.op_start) / SLOT_MINUTES).max(0) as usize
    }

    /// Slot index of a minute, clamped into the operating window.
    #[inline]
    pub fn slot_of(&self, minutes: Minutes) -> usize {
        let clamped = minutes.clamp(self.op_start, self.op_end);
        ((clamped - self.op_start) / SLOT_MINUTES) as usize
    }

    /// Absolute minute of a slot index.
    #[inline]
    pub fn minute_of(&self, slot: usize) -> Minutes {
        self.op_start + slot as Minutes * SLOT_MINUTES
    }

    /// Latest minute at which a lunch may begin.
    #[inline]
    pub fn latest_lunch_start(&self) -> Minutes {
        self.lunch_end - self.lunch_minutes
    }

    /// Validates window geometry and search parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("op_start", self.op_start),
            ("op_end", self.op_end),
            ("lunch_start", self.lunch_start),
            ("lunch_end", self.lunch_end),
        ] {
            if !on_grid(value) {
                return Err(ConfigError::OffGrid(name, value));
            }
        }
        if self.op_end <= self.op_start {
            return Err(ConfigError::EmptyWindow("operating"));
        }
        if self.lunch_end <= self.lunch_start {
            return Err(ConfigError::EmptyWindow("lunch"));
        }
        if self.num_slots() > MAX_SLOTS {
            return Err(ConfigError::TooManySlots(self.num_slots()));
        }
        if self.population_size < 2 {
            return Err(ConfigError::BadSearchParameter("population_size must be at least 2"));
        }
        if self.max_generations == 0 {
            return Err(ConfigError::BadSearchParameter("max_generations must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.elitism) {
            return Err(ConfigError::BadSearchParameter("elitism must be in [0, 1)"));
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::BadSearchParameter("tournament_size must be at least 1"));
        }
        if self.aba_min <= 0 || self.aba_max < self.aba_min {
            return Err(ConfigError::BadSearchParameter("ABA duration bounds are inverted"));
        }
        Ok(())
    }
}
