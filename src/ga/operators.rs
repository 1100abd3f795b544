//! Genetic operators over roster individuals.
//!
//! Mutation perturbs a small share of entries with slot-granular slide
//! and resize moves, kernel-checked so infeasible perturbations are
//! simply not taken. Crossover recombines two parents along a random
//! therapist partition and replays the union through an availability
//! tracker, dropping whatever no longer fits.

use rand::Rng;
use rand::seq::SliceRandom;

use super::individual::RosterIndividual;
use crate::availability::AvailabilityTracker;
use crate::constraints;
use crate::context::EngineContext;
use crate::ids::IdMint;
use crate::models::{Role, ScheduleEntry, SessionKind};
use crate::time::SLOT_MINUTES;

/// Perturbs roughly `config.mutation_strength` of the entries.
///
/// Each chosen entry takes one uniform move: a slide of one slot in
/// either direction, or (ABA only) a resize of one slot. Moves that fail
/// the kernel are discarded.
pub fn mutate<R: Rng>(individual: &mut RosterIndividual, ctx: &EngineContext, rng: &mut R) {
    if individual.entries.is_empty() {
        return;
    }
    let count = ((individual.entries.len() as f64 * ctx.config.mutation_strength).ceil() as usize)
        .clamp(1, individual.entries.len());

    for _ in 0..count {
        let index = rng.random_range(0..individual.entries.len());
        if rng.random_bool(0.5) {
            slide_entry(individual, index, ctx, rng);
        } else {
            resize_entry(individual, index, ctx, rng);
        }
    }
    individual.fitness = f64::INFINITY;
}

/// Shifts one entry a slot earlier or later, keeping its duration.
fn slide_entry<R: Rng>(
    individual: &mut RosterIndividual,
    index: usize,
    ctx: &EngineContext,
    rng: &mut R,
) {
    let delta = if rng.random_bool(0.5) { SLOT_MINUTES } else { -SLOT_MINUTES };
    let mut moved = individual.entries[index].clone();
    moved.start += delta;
    moved.end += delta;
    if moved.start < ctx.config.op_start || moved.end > ctx.config.op_end {
        return;
    }
    let id = moved.id.clone();
    if constraints::can_add(&moved, &individual.entries, Some(id.as_str()), ctx).is_ok() {
        individual.entries[index] = moved;
    }
}

/// Grows or shrinks one ABA entry's end by a slot, within bounds.
fn resize_entry<R: Rng>(
    individual: &mut RosterIndividual,
    index: usize,
    ctx: &EngineContext,
    rng: &mut R,
) {
    let entry = &individual.entries[index];
    if entry.kind != SessionKind::Aba {
        return;
    }
    let delta = if rng.random_bool(0.5) { SLOT_MINUTES } else { -SLOT_MINUTES };
    let mut resized = entry.clone();
    resized.end += delta;
    let duration = resized.duration();
    if duration < ctx.config.aba_min
        || duration > ctx.config.aba_max
        || resized.end > ctx.config.op_end
    {
        return;
    }
    let id = resized.id.clone();
    if constraints::can_add(&resized, &individual.entries, Some(id.as_str()), ctx).is_ok() {
        individual.entries[index] = resized;
    }
}

/// Therapist-partition crossover.
///
/// Splits the therapist pool into two random halves, takes parent 1's
/// entries for the first half and parent 2's for the second, then
/// replays the union (senior placements first, then by start time) into
/// an empty tracker, dropping entries whose therapist or client slot is
/// already booked.
pub fn partition_crossover<R: Rng>(
    parent1: &RosterIndividual,
    parent2: &RosterIndividual,
    ctx: &EngineContext,
    ids: &mut IdMint,
    rng: &mut R,
) -> RosterIndividual {
    let mut pool: Vec<&str> = ctx.therapists.keys().map(String::as_str).collect();
    pool.sort();
    pool.shuffle(rng);
    let half: std::collections::HashSet<&str> =
        pool.iter().take(pool.len() / 2).copied().collect();

    let mut union: Vec<ScheduleEntry> = Vec::new();
    for entry in &parent1.entries {
        if half.contains(entry.therapist_id.as_str()) {
            union.push(entry.clone());
        }
    }
    for entry in &parent2.entries {
        if !half.contains(entry.therapist_id.as_str()) {
            union.push(entry.clone());
        }
    }

    // Senior placements keep priority during the replay.
    union.sort_by_key(|e| {
        let bcba = ctx
            .therapist(&e.therapist_id)
            .map(|t| t.role == Role::Bcba)
            .unwrap_or(false);
        (!bcba, e.start)
    });

    let mut tracker = AvailabilityTracker::new(&ctx.config);
    let mut offspring = Vec::with_capacity(union.len());
    for mut entry in union {
        if !tracker.pair_available(
            &entry.therapist_id,
            entry.client_id.as_deref(),
            entry.start,
            entry.end,
            None,
        ) {
            continue;
        }
        entry.id = ids.next_id();
        tracker.book_entry(&entry);
        offspring.push(entry);
    }

    RosterIndividual::new(offspring)
}
