//! The roster engine.
//!
//! `RosterEngine::run` is the single entrypoint: it snapshots the inputs,
//! seeds a population (caller seed, base schedule, mined prior schedules,
//! fresh constructive seeds), evolves it with elitist generational
//! replacement and diversity-preserving selection, polishes the best
//! individual with a therapist-swap local search, and returns the result
//! with its residual violations.
//!
//! No error escapes `run`: input problems come back as tagged violations
//! with an empty schedule, and the search itself is bounded by the
//! generation cap and the plateau rule.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::ga::{FitnessEvaluator, RosterIndividual, mutate, partition_crossover};
use crate::ids::IdMint;
use crate::kpi::RosterKpi;
use crate::learning::{LearningService, NoLearning};
use crate::models::{BaseSchedule, Callout, Client, DaySchedule, ScheduleEntry, Therapist, Violation};
use crate::repair::{cleanup_merge, repair};
use crate::seeder::Seeder;
use crate::validation::validate_request;

/// Share of the population seeded from mined prior schedules.
const LEARNED_SEED_SHARE: f64 = 0.20;

/// Inputs for one engine run.
#[derive(Debug, Clone, Default)]
pub struct RosterRequest {
    /// Clients on the day's roster.
    pub clients: Vec<Client>,
    /// Available therapist pool.
    pub therapists: Vec<Therapist>,
    /// Date to schedule.
    pub date: Option<NaiveDate>,
    /// Declared unavailability windows.
    pub callouts: Vec<Callout>,
    /// Optional caller-provided starting schedule.
    pub seed: Option<DaySchedule>,
    /// Optional per-weekday preset.
    pub base_schedule: Option<BaseSchedule>,
    /// RNG seed for reproducibility.
    pub rng_seed: Option<u64>,
    /// Cooperative cancellation flag, checked at generation boundaries.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RosterRequest {
    /// Creates a request for one date.
    pub fn new(clients: Vec<Client>, therapists: Vec<Therapist>, date: NaiveDate) -> Self {
        Self {
            clients,
            therapists,
            date: Some(date),
            ..Self::default()
        }
    }

    /// Sets the callouts.
    pub fn with_callouts(mut self, callouts: Vec<Callout>) -> Self {
        self.callouts = callouts;
        self
    }

    /// Sets a starting schedule.
    pub fn with_seed(mut self, seed: DaySchedule) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets the base-schedule preset.
    pub fn with_base_schedule(mut self, base: BaseSchedule) -> Self {
        self.base_schedule = Some(base);
        self
    }

    /// Sets the RNG seed.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Attaches a cancellation flag.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct EngineOutcome {
    /// The best schedule found (empty on input errors).
    pub schedule: DaySchedule,
    /// Residual violations of the returned schedule.
    pub violations: Vec<Violation>,
    /// Generations evaluated.
    pub generations: usize,
    /// Fitness of the returned schedule.
    pub best_fitness: f64,
    /// Whether the schedule is below the success threshold.
    pub success: bool,
    /// Human-readable outcome summary.
    pub status: String,
}

/// The constructive + evolutionary roster optimizer.
#[derive(Debug, Clone, Default)]
pub struct RosterEngine {
    config: EngineConfig,
}

impl RosterEngine {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Runs the optimizer without a learning service.
    pub fn run(&self, request: &RosterRequest) -> EngineOutcome {
        self.run_with_learning(request, &NoLearning)
    }

    /// Runs the optimizer with a learning collaborator.
    pub fn run_with_learning(
        &self,
        request: &RosterRequest,
        learning: &dyn LearningService,
    ) -> EngineOutcome {
        let fallback_date = NaiveDate::default();

        if let Err(error) = self.config.validate() {
            return EngineOutcome {
                schedule: DaySchedule::new(request.date.unwrap_or(fallback_date)),
                violations: Vec::new(),
                generations: 0,
                best_fitness: f64::INFINITY,
                success: false,
                status: format!("invalid configuration: {error}"),
            };
        }

        let input_violations = validate_request(
            request.date,
            &request.clients,
            &request.therapists,
            &request.callouts,
        );
        if !input_violations.is_empty() {
            return EngineOutcome {
                schedule: DaySchedule::new(request.date.unwrap_or(fallback_date)),
                violations: input_violations,
                generations: 0,
                best_fitness: f64::INFINITY,
                success: false,
                status: "rejected: invalid inputs".to_string(),
            };
        }
        let date = request.date.unwrap_or(fallback_date);

        // Nothing to schedule is a trivially satisfied day.
        if request.clients.is_empty() || request.therapists.is_empty() {
            return EngineOutcome {
                schedule: DaySchedule::new(date),
                violations: Vec::new(),
                generations: 0,
                best_fitness: 0.0,
                success: true,
                status: "nothing to schedule".to_string(),
            };
        }

        let ctx = EngineContext::new(
            self.config.clone(),
            date,
            request.clients.clone(),
            request.therapists.clone(),
            request.callouts.clone(),
        );
        let mut rng = match request.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let mut ids = IdMint::new();
        let evaluator = FitnessEvaluator::new(&ctx);
        let lunch_prefs = learning.lunch_preferences();
        let seeder = Seeder::new(&ctx, &lunch_prefs);

        info!(
            date = %date,
            clients = ctx.clients.len(),
            therapists = ctx.therapists.len(),
            callouts = ctx.callouts.len(),
            "starting roster run"
        );

        let mut population = self.initial_population(
            request, &ctx, &seeder, learning, &mut ids, &mut rng,
        );
        for individual in &mut population {
            if !individual.is_evaluated() {
                individual.fitness = evaluator.evaluate(&individual.entries).0;
            }
        }

        let (mut best, generations, cancelled) =
            self.evolve(&mut population, &ctx, &evaluator, request, &mut ids, &mut rng);

        if !cancelled {
            self.local_search(&mut best, &ctx, &evaluator);
            cleanup_merge(&mut best.entries, &ctx);
        }

        let (best_fitness, violations) = evaluator.evaluate(&best.entries);
        let schedule = DaySchedule {
            date,
            entries: best.entries,
        };
        let success = !cancelled && best_fitness < self.config.success_threshold;
        let status = if cancelled {
            format!("cancelled after {generations} generations, best fitness {best_fitness:.0}")
        } else {
            format!("completed {generations} generations, best fitness {best_fitness:.0}")
        };

        let kpi = RosterKpi::calculate(&schedule, &ctx);
        info!(
            generations,
            best_fitness,
            success,
            violations = violations.len(),
            coverage = kpi.coverage_rate,
            "roster run finished"
        );

        EngineOutcome {
            schedule,
            violations,
            generations,
            best_fitness,
            success,
            status,
        }
    }

    /// Builds the initial population from seeds and constructive builds.
    fn initial_population(
        &self,
        request: &RosterRequest,
        ctx: &EngineContext,
        seeder: &Seeder<'_>,
        learning: &dyn LearningService,
        ids: &mut IdMint,
        rng: &mut SmallRng,
    ) -> Vec<RosterIndividual> {
        let size = self.config.population_size;
        let mut population = Vec::with_capacity(size);

        if let Some(seed) = &request.seed {
            let mut individual = RosterIndividual::new(reidentify(&seed.entries, ids));
            repair(&mut individual.entries, ctx, ids, rng);
            population.push(individual);
        }

        if let Some(base) = &request.base_schedule {
            let preset: Vec<ScheduleEntry> = base
                .entries_for(ctx.weekday)
                .into_iter()
                .cloned()
                .collect();
            if !preset.is_empty() {
                let mut individual = RosterIndividual::new(reidentify(&preset, ids));
                repair(&mut individual.entries, ctx, ids, rng);
                population.push(individual);
            }
        }

        let learned_slots = (size as f64 * LEARNED_SEED_SHARE) as usize;
        for prior in learning.top_schedules(ctx.weekday, learned_slots) {
            if population.len() >= size {
                break;
            }
            let mut individual = RosterIndividual::new(reidentify(&prior.entries, ids));
            repair(&mut individual.entries, ctx, ids, rng);
            population.push(individual);
        }

        while population.len() < size {
            let entries = seeder.build(request.base_schedule.as_ref(), ids, rng);
            population.push(RosterIndividual::new(entries));
        }
        population
    }

    /// The generational loop; returns (best, generations, cancelled).
    fn evolve(
        &self,
        population: &mut Vec<RosterIndividual>,
        ctx: &EngineContext,
        evaluator: &FitnessEvaluator<'_>,
        request: &RosterRequest,
        ids: &mut IdMint,
        rng: &mut SmallRng,
    ) -> (RosterIndividual, usize, bool) {
        let config = &self.config;
        let elite_count = ((config.population_size as f64 * config.elitism) as usize).max(1);

        population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        let mut best = population[0].clone();
        let mut stale_generations = 0;
        let mut generation = 0;

        while generation < config.max_generations {
            if let Some(cancel) = &request.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return (best, generation, true);
                }
            }
            if best.fitness == 0.0 {
                break;
            }
            if stale_generations >= config.plateau {
                debug!(generation, "plateau reached");
                break;
            }

            let mut next: Vec<RosterIndividual> =
                population.iter().take(elite_count).cloned().collect();

            while next.len() < config.population_size {
                let parent1 = self.select(population, rng);
                let mut child = if rng.random_bool(config.crossover_rate) {
                    let parent2 = self.select(population, rng);
                    partition_crossover(parent1, parent2, ctx, ids, rng)
                } else {
                    parent1.clone()
                };
                repair(&mut child.entries, ctx, ids, rng);
                if rng.random_bool(config.mutation_rate) {
                    mutate(&mut child, ctx, rng);
                }
                child.fitness = evaluator.evaluate(&child.entries).0;
                next.push(child);
            }

            *population = next;
            population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
            generation += 1;

            if population[0].fitness < best.fitness {
                best = population[0].clone();
                stale_generations = 0;
            } else {
                stale_generations += 1;
            }
            debug!(generation, best_fitness = best.fitness, "generation done");
        }

        (best, generation, false)
    }

    /// Diversity-preserving selection: mostly tournaments, with a uniform
    /// share to keep weak genomes in circulation. Always with replacement.
    fn select<'p>(
        &self,
        population: &'p [RosterIndividual],
        rng: &mut SmallRng,
    ) -> &'p RosterIndividual {
        if rng.random_bool(self.config.uniform_selection_rate) {
            return &population[rng.random_range(0..population.len())];
        }
        let mut winner = &population[rng.random_range(0..population.len())];
        for _ in 1..self.config.tournament_size {
            let challenger = &population[rng.random_range(0..population.len())];
            if challenger.fitness < winner.fitness {
                winner = challenger;
            }
        }
        winner
    }

    /// Therapist-swap 2-opt polish on the best individual.
    fn local_search(
        &self,
        best: &mut RosterIndividual,
        ctx: &EngineContext,
        evaluator: &FitnessEvaluator<'_>,
    ) {
        let mut current_fitness = evaluator.evaluate(&best.entries).0;

        for _ in 0..self.config.local_search_iterations {
            let mut improved = false;
            for i in 0..best.entries.len() {
                for j in (i + 1)..best.entries.len() {
                    if best.entries[i].client_id.is_none()
                        || best.entries[j].client_id.is_none()
                        || best.entries[i].therapist_id == best.entries[j].therapist_id
                    {
                        continue;
                    }
                    let mut candidate = best.entries.clone();
                    let tmp = candidate[i].therapist_id.clone();
                    candidate[i].therapist_id = candidate[j].therapist_id.clone();
                    candidate[j].therapist_id = tmp;

                    let fitness = evaluator.evaluate(&candidate).0;
                    if fitness < current_fitness {
                        best.entries = candidate;
                        current_fitness = fitness;
                        improved = true;
                    }
                }
            }
            if !improved {
                break;
            }
        }
        best.fitness = current_fitness;
    }
}

/// Clones entries with fresh ids.
fn reidentify(entries: &[ScheduleEntry], ids: &mut IdMint) -> Vec<ScheduleEntry> {
    entries
        .iter()
        .map(|entry| {
            let mut cloned = entry.clone();
            cloned.id = ids.next_id();
            cloned
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SessionKind, ViolationRule};
    use chrono::Weekday;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn fast_config() -> EngineConfig {
        EngineConfig::default()
            .with_population_size(12)
            .with_max_generations(25)
            .with_plateau(8)
    }

    #[test]
    fn test_missing_date_rejected() {
        let engine = RosterEngine::new();
        let request = RosterRequest {
            clients: vec![Client::new("c1")],
            therapists: vec![Therapist::new("t1", Role::Rbt)],
            date: None,
            ..RosterRequest::default()
        };
        let outcome = engine.run(&request);
        assert!(!outcome.success);
        assert!(outcome.schedule.is_empty());
        assert_eq!(outcome.violations[0].rule, ViolationRule::MissingDate);
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let engine = RosterEngine::new();
        let callout = Callout::new(
            "co1",
            crate::models::CalloutTarget::Therapist,
            "ghost",
            monday(),
            crate::time::TimeRange::new(480, 540),
        );
        let request = RosterRequest::new(
            vec![Client::new("c1")],
            vec![Therapist::new("t1", Role::Rbt)],
            monday(),
        )
        .with_callouts(vec![callout]);
        let outcome = engine.run(&request);
        assert!(!outcome.success);
        assert!(outcome.schedule.is_empty());
        assert_eq!(outcome.violations[0].rule, ViolationRule::UnknownEntity);
    }

    #[test]
    fn test_empty_inputs_trivially_succeed() {
        let engine = RosterEngine::new();
        let outcome = engine.run(&RosterRequest::new(vec![], vec![], monday()));
        assert!(outcome.success);
        assert!(outcome.schedule.is_empty());
        assert!(outcome.violations.is_empty());

        let outcome = engine.run(&RosterRequest::new(
            vec![Client::new("c1")],
            vec![],
            monday(),
        ));
        assert!(outcome.success);
        assert!(outcome.schedule.is_empty());
    }

    #[test]
    fn test_cancellation_returns_best_so_far() {
        let engine = RosterEngine::with_config(fast_config());
        let flag = Arc::new(AtomicBool::new(true)); // pre-cancelled
        let request = RosterRequest::new(
            vec![Client::new("c1")],
            vec![Therapist::new("t1", Role::Rbt)],
            monday(),
        )
        .with_rng_seed(42)
        .with_cancel_flag(flag);
        let outcome = engine.run(&request);
        assert!(!outcome.success);
        assert!(outcome.status.contains("cancelled"));
    }

    #[test]
    fn test_run_is_reproducible_with_seed() {
        let engine = RosterEngine::with_config(fast_config());
        let make_request = || {
            RosterRequest::new(
                vec![Client::new("c1").with_requirement("MD_MEDICAID")],
                vec![
                    Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
                    Therapist::new("t2", Role::Bcba).with_qualification("MD_MEDICAID"),
                ],
                monday(),
            )
            .with_rng_seed(1234)
        };
        let a = engine.run(&make_request());
        let b = engine.run(&make_request());
        assert_eq!(a.best_fitness, b.best_fitness);
        assert_eq!(a.schedule.len(), b.schedule.len());
    }

    #[test]
    fn test_seeded_rerun_does_not_regress() {
        let engine = RosterEngine::with_config(fast_config());
        let clients = vec![Client::new("c1").with_requirement("MD_MEDICAID")];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
            Therapist::new("t2", Role::Bcba).with_qualification("MD_MEDICAID"),
        ];
        let first = engine.run(
            &RosterRequest::new(clients.clone(), therapists.clone(), monday()).with_rng_seed(7),
        );
        let second = engine.run(
            &RosterRequest::new(clients, therapists, monday())
                .with_rng_seed(8)
                .with_seed(first.schedule.clone()),
        );
        assert!(second.best_fitness <= first.best_fitness);
    }

    #[test]
    fn test_two_therapists_cover_one_client() {
        let engine = RosterEngine::with_config(
            EngineConfig::default()
                .with_population_size(20)
                .with_max_generations(40)
                .with_plateau(12),
        );
        let request = RosterRequest::new(
            vec![Client::new("c1").with_requirement("MD_MEDICAID")],
            vec![
                Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
                Therapist::new("t2", Role::Bcba).with_qualification("MD_MEDICAID"),
            ],
            monday(),
        )
        .with_rng_seed(42);
        let outcome = engine.run(&request);

        assert!(outcome.success, "status: {}", outcome.status);
        // Full coverage of the client
        assert!(
            !outcome
                .violations
                .iter()
                .any(|v| v.rule == ViolationRule::CoverageGap),
            "violations: {:?}",
            outcome.violations
        );
        // Every entry sits on the grid inside the operating window
        for entry in &outcome.schedule.entries {
            assert!(entry.start >= 480 && entry.end <= 1020);
            assert_eq!(entry.start % 15, 0);
            assert_eq!(entry.end % 15, 0);
        }
    }

    #[test]
    fn test_weekend_has_no_aba() {
        let engine = RosterEngine::with_config(fast_config());
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let request = RosterRequest::new(
            vec![Client::new("c1")],
            vec![Therapist::new("t1", Role::Rbt)],
            saturday,
        )
        .with_rng_seed(42);
        let outcome = engine.run(&request);
        assert!(outcome
            .schedule
            .entries
            .iter()
            .all(|e| e.kind != SessionKind::Aba));
        assert!(!outcome
            .violations
            .iter()
            .any(|v| v.rule == ViolationRule::AbaOnWeekend));
    }

    #[test]
    fn test_base_schedule_seeds_population() {
        let engine = RosterEngine::with_config(fast_config());
        let base = BaseSchedule::new("b1", "preset")
            .with_weekday(Weekday::Mon)
            .with_entry(ScheduleEntry::new(
                "p1",
                "c1",
                "t1",
                Weekday::Mon,
                480,
                660,
                SessionKind::Aba,
            ));
        let request = RosterRequest::new(
            vec![Client::new("c1")],
            vec![Therapist::new("t1", Role::Rbt), Therapist::new("t2", Role::Rbt)],
            monday(),
        )
        .with_base_schedule(base)
        .with_rng_seed(42);
        let outcome = engine.run(&request);
        assert!(!outcome.schedule.is_empty());
    }
}
