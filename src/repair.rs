//! Repair operators.
//!
//! Applied after every mutation and crossover, in fixed order. Each
//! operator targets one violation family and uses the constraint kernel
//! for acceptance, so none of them introduces a fresh conflict:
//!
//! 1. cleanup-merge          4. Medicaid cap        7. lunch placement
//! 2. duration clamp         5. back-to-back shift  8. team realignment
//! 3. credential swap        6. coverage-gap fill

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::availability::AvailabilityTracker;
use crate::constraints;
use crate::context::EngineContext;
use crate::coverage::client_coverage_gaps;
use crate::ids::IdMint;
use crate::models::{CalloutTarget, ScheduleEntry, SessionKind};
use crate::time::{Minutes, SLOT_MINUTES, TimeRange};

/// Fixpoint cap for the merge pass.
const MERGE_MAX_PASSES: usize = 50;

/// Lunch candidates tried before falling back to a session split.
const LUNCH_CANDIDATES: usize = 5;

/// Minimum ABA length worth splitting to free a lunch hole.
const SPLITTABLE_ABA: Minutes = 90;

/// Runs the full repair pipeline over one individual's entries.
pub fn repair<R: Rng>(
    entries: &mut Vec<ScheduleEntry>,
    ctx: &EngineContext,
    ids: &mut IdMint,
    rng: &mut R,
) {
    cleanup_merge(entries, ctx);
    duration_clamp(entries, ctx);
    credential_swap(entries, ctx, rng);
    medicaid_cap(entries, ctx, rng);
    back_to_back_shift(entries, ctx);
    coverage_gap_fill(entries, ctx, ids, rng);
    lunch_placement(entries, ctx, ids);
    team_realign(entries, ctx);
}

/// Merges adjoining ABA entries of the same (therapist, client) while the
/// combined duration stays within bounds. Iterates to a fixpoint.
pub fn cleanup_merge(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext) {
    for _ in 0..MERGE_MAX_PASSES {
        let mut merged = false;
        entries.sort_by(|a, b| (a.therapist_id.as_str(), a.start).cmp(&(b.therapist_id.as_str(), b.start)));

        let mut i = 0;
        while i + 1 < entries.len() {
            let (a, b) = (&entries[i], &entries[i + 1]);
            let mergeable = a.therapist_id == b.therapist_id
                && a.kind == SessionKind::Aba
                && b.kind == SessionKind::Aba
                && a.client_id.is_some()
                && a.client_id == b.client_id
                && a.end == b.start
                && (b.end - a.start) <= ctx.config.aba_max;
            if mergeable {
                let new_end = b.end;
                entries[i].end = new_end;
                entries.remove(i + 1);
                merged = true;
            } else {
                i += 1;
            }
        }
        if !merged {
            break;
        }
    }
}

/// Clamps ABA durations back into the configured bounds.
///
/// A too-short session is extended forward (slid back from the window
/// edge if needed); an overlap introduced here is caught by the kernel
/// on the next pass.
pub fn duration_clamp(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext) {
    let (aba_min, aba_max) = (ctx.config.aba_min, ctx.config.aba_max);
    let op_end = ctx.config.op_end;
    for entry in entries.iter_mut() {
        if entry.kind != SessionKind::Aba || entry.client_id.is_none() {
            continue;
        }
        let duration = entry.duration();
        if duration > aba_max {
            entry.end = entry.start + aba_max;
        } else if duration < aba_min {
            entry.end = entry.start + aba_min;
            if entry.end > op_end {
                entry.end = op_end;
                entry.start = op_end - aba_min;
            }
        }
    }
}

/// Reassigns entries whose therapist fails the client's requirements.
pub fn credential_swap<R: Rng>(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext, rng: &mut R) {
    for i in 0..entries.len() {
        let entry = &entries[i];
        let mismatch = constraints::credential_mismatch(entry, ctx)
            || constraints::ah_qualification_missing(entry, ctx);
        if !mismatch {
            continue;
        }
        let Some(client) = entry.client_id.as_deref().and_then(|c| ctx.client(c)) else {
            continue;
        };

        let mut candidates: Vec<String> = match entry.kind.ah_kind() {
            Some(kind) => ctx
                .ah_qualified_therapists(client, kind)
                .iter()
                .map(|t| t.id.clone())
                .collect(),
            None => ctx
                .qualified_therapists(client)
                .iter()
                .map(|t| t.id.clone())
                .collect(),
        };
        candidates.shuffle(rng);

        for candidate in candidates {
            let mut swapped = entries[i].clone();
            swapped.therapist_id = candidate;
            let id = swapped.id.clone();
            if constraints::can_add(&swapped, entries, Some(id.as_str()), ctx).is_ok() {
                entries[i] = swapped;
                break;
            }
        }
    }
}

/// Enforces the distinct-therapist cap for MD Medicaid clients.
///
/// Keeps the first three therapists by start order; entries under any
/// other therapist are swapped into the kept three or dropped.
pub fn medicaid_cap<R: Rng>(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext, rng: &mut R) {
    let mut client_ids: Vec<String> = ctx
        .clients
        .values()
        .filter(|c| c.is_md_medicaid())
        .map(|c| c.id.clone())
        .collect();
    client_ids.sort();

    for client_id in client_ids {
        let mut client_entries: Vec<usize> = (0..entries.len())
            .filter(|&i| entries[i].client_id.as_deref() == Some(client_id.as_str()))
            .collect();
        client_entries.sort_by_key(|&i| entries[i].start);

        let mut kept: Vec<String> = Vec::new();
        for &i in &client_entries {
            let therapist = entries[i].therapist_id.clone();
            if !kept.contains(&therapist) && kept.len() < crate::validator::MEDICAID_THERAPIST_CAP {
                kept.push(therapist);
            }
        }

        let mut to_drop: Vec<String> = Vec::new();
        for &i in &client_entries {
            if kept.contains(&entries[i].therapist_id) {
                continue;
            }
            let mut allowed = kept.clone();
            allowed.shuffle(rng);
            let mut fixed = false;
            for replacement in allowed {
                let mut swapped = entries[i].clone();
                swapped.therapist_id = replacement;
                let id = swapped.id.clone();
                let qualified = ctx
                    .therapist(&swapped.therapist_id)
                    .map(|t| match swapped.kind.ah_kind() {
                        Some(kind) => t.can_deliver(kind),
                        None => true,
                    })
                    .unwrap_or(false);
                if qualified && constraints::can_add(&swapped, entries, Some(id.as_str()), ctx).is_ok() {
                    entries[i] = swapped;
                    fixed = true;
                    break;
                }
            }
            if !fixed {
                to_drop.push(entries[i].id.clone());
            }
        }
        entries.retain(|e| !to_drop.contains(&e.id));
    }
}

/// Separates adjoining same-client sessions of one therapist.
///
/// Tries sliding the later entry forward, then the earlier one back;
/// drops the later entry when neither slide is kernel-clean.
pub fn back_to_back_shift(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext) {
    entries.sort_by(|a, b| (a.therapist_id.as_str(), a.start).cmp(&(b.therapist_id.as_str(), b.start)));

    let mut to_drop: Vec<String> = Vec::new();
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let (a, b) = (&entries[i], &entries[j]);
            let touching = a.therapist_id == b.therapist_id
                && a.client_id.is_some()
                && a.client_id == b.client_id
                && a.end == b.start
                && !to_drop.contains(&a.id)
                && !to_drop.contains(&b.id);
            if !touching {
                continue;
            }

            // Slide the later entry forward a slot.
            let mut later = entries[j].clone();
            later.start += SLOT_MINUTES;
            later.end += SLOT_MINUTES;
            let later_id = later.id.clone();
            if later.end <= ctx.config.op_end
                && constraints::can_add(&later, entries, Some(later_id.as_str()), ctx).is_ok()
            {
                entries[j] = later;
                continue;
            }

            // Slide the earlier entry back a slot.
            let mut earlier = entries[i].clone();
            earlier.start -= SLOT_MINUTES;
            earlier.end -= SLOT_MINUTES;
            let earlier_id = earlier.id.clone();
            if earlier.start >= ctx.config.op_start
                && constraints::can_add(&earlier, entries, Some(earlier_id.as_str()), ctx).is_ok()
            {
                entries[i] = earlier;
                continue;
            }

            to_drop.push(entries[j].id.clone());
        }
    }
    entries.retain(|e| !to_drop.contains(&e.id));
}

/// Fills client coverage gaps of an hour or more with new ABA sessions.
pub fn coverage_gap_fill<R: Rng>(
    entries: &mut Vec<ScheduleEntry>,
    ctx: &EngineContext,
    ids: &mut IdMint,
    rng: &mut R,
) {
    if ctx.is_weekend() {
        return;
    }
    let mut tracker = AvailabilityTracker::new(&ctx.config);
    tracker.rebuild(entries, &ctx.callouts, ctx.date);

    let mut client_ids: Vec<&String> = ctx.clients.keys().collect();
    client_ids.sort();

    for client_id in client_ids {
        let client = &ctx.clients[client_id];
        let mut qualified: Vec<String> = ctx
            .qualified_therapists(client)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        if qualified.is_empty() {
            continue;
        }

        for gap in client_coverage_gaps(client_id, entries, ctx) {
            let mut cursor = gap.start;
            while gap.end - cursor >= ctx.config.aba_min {
                let mut placed = false;
                let longest = (gap.end - cursor).min(ctx.config.aba_max);
                let mut length = longest - longest % SLOT_MINUTES;
                while length >= ctx.config.aba_min && !placed {
                    qualified.shuffle(rng);
                    for therapist_id in &qualified {
                        if !tracker.pair_available(
                            therapist_id,
                            Some(client_id.as_str()),
                            cursor,
                            cursor + length,
                            None,
                        ) {
                            continue;
                        }
                        let entry = ScheduleEntry::new(
                            ids.next_id(),
                            client_id.clone(),
                            therapist_id,
                            ctx.weekday,
                            cursor,
                            cursor + length,
                            SessionKind::Aba,
                        );
                        if constraints::can_add(&entry, entries, None, ctx).is_ok() {
                            tracker.book_entry(&entry);
                            entries.push(entry);
                            cursor += length;
                            placed = true;
                            break;
                        }
                    }
                    if !placed {
                        length -= SLOT_MINUTES;
                    }
                }
                if !placed {
                    break;
                }
            }
        }
    }
}

/// Scored candidate slot for one therapist's lunch.
#[derive(Debug, Clone, Copy)]
struct LunchCandidate {
    start: Minutes,
    score: f64,
}

/// Places lunches for working therapists without one.
///
/// Candidates are scored on midpoint proximity, natural adjacent gaps,
/// client-coverage redundancy, workload split, team stagger, and the
/// ideal mid-window; the best five are tried in order. If nothing fits,
/// a long ABA session is split to carve the hole.
pub fn lunch_placement(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext, ids: &mut IdMint) {
    let mut tracker = AvailabilityTracker::new(&ctx.config);
    tracker.rebuild(entries, &ctx.callouts, ctx.date);

    let mut therapist_ids: Vec<&String> = ctx.therapists.keys().collect();
    therapist_ids.sort();

    for therapist_id in therapist_ids {
        let billable: Minutes = entries
            .iter()
            .filter(|e| &e.therapist_id == therapist_id && e.is_billable())
            .map(|e| e.duration())
            .sum();
        if billable < ctx.config.lunch_threshold {
            continue;
        }
        if entries.iter().any(|e| e.is_lunch() && &e.therapist_id == therapist_id) {
            continue;
        }

        let mut candidates = score_lunch_candidates(therapist_id, entries, ctx, &tracker);
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut placed = false;
        for candidate in candidates.iter().take(LUNCH_CANDIDATES) {
            let lunch = ScheduleEntry::lunch(
                ids.next_id(),
                therapist_id,
                ctx.weekday,
                candidate.start,
                ctx.config.lunch_minutes,
            );
            if constraints::can_add(&lunch, entries, None, ctx).is_ok() {
                tracker.book_entry(&lunch);
                entries.push(lunch);
                placed = true;
                break;
            }
        }

        if !placed {
            split_session_for_lunch(therapist_id, entries, ctx, ids, &mut tracker);
        }
    }
}

/// Scores every free 30-minute window in the lunch window.
fn score_lunch_candidates(
    therapist_id: &str,
    entries: &[ScheduleEntry],
    ctx: &EngineContext,
    tracker: &AvailabilityTracker,
) -> Vec<LunchCandidate> {
    let config = &ctx.config;
    let lunch_len = config.lunch_minutes;

    let own: Vec<&ScheduleEntry> = entries
        .iter()
        .filter(|e| e.therapist_id == therapist_id && e.is_billable())
        .collect();
    let day_start = own.iter().map(|e| e.start).min().unwrap_or(config.op_start);
    let day_end = own.iter().map(|e| e.end).max().unwrap_or(config.op_end);
    let midpoint = (day_start + day_end) / 2;
    let total_billable: Minutes = own.iter().map(|e| e.duration()).sum();

    let served_clients: HashSet<&str> = own
        .iter()
        .filter_map(|e| e.client_id.as_deref())
        .collect();

    // Teammate lunch starts, for the stagger penalty.
    let teammate_lunches: Vec<Minutes> = match ctx.therapist(therapist_id) {
        Some(therapist) => {
            let teammates: HashSet<&str> = ctx
                .teammates(therapist)
                .iter()
                .map(|t| t.id.as_str())
                .collect();
            entries
                .iter()
                .filter(|e| e.is_lunch() && teammates.contains(e.therapist_id.as_str()))
                .map(|e| e.start)
                .collect()
        }
        None => Vec::new(),
    };
    let teammate_count = teammate_lunches.len().max(1);

    let ideal_center = (config.lunch_start + config.lunch_end) / 2;

    let mut candidates = Vec::new();
    let mut start = config.lunch_start;
    while start <= config.latest_lunch_start() {
        if !tracker.pair_available(therapist_id, None, start, start + lunch_len, None) {
            start += SLOT_MINUTES;
            continue;
        }

        let mut score = 0.0;

        // Proximity to the workday midpoint, 0-100.
        let center = start + lunch_len / 2;
        score += (100 - (center - midpoint).abs()).max(0) as f64;

        // Natural pre/post gap of at least 30 minutes.
        let pre_free = start - 30 >= config.op_start
            && tracker.pair_available(therapist_id, None, start - 30, start, None);
        let post_free = start + lunch_len + 30 <= config.op_end
            && tracker.pair_available(therapist_id, None, start + lunch_len, start + lunch_len + 30, None);
        if pre_free || post_free {
            score += 50.0;
        }

        // Client coverage redundancy: served clients busy elsewhere.
        if !served_clients.is_empty() {
            let covered = served_clients
                .iter()
                .filter(|c| !tracker.available(CalloutTarget::Client, c, start, start + lunch_len, None))
                .count();
            score += 30.0 * covered as f64 / served_clients.len() as f64;
        }

        // Workload split balance, 0-40.
        if total_billable > 0 {
            let morning = TimeRange::new(config.op_start, start);
            let before: Minutes = own.iter().map(|e| e.span().overlap_minutes(&morning)).sum();
            let after = total_billable - before;
            let imbalance = (before - after).abs() as f64 / total_billable as f64;
            score += 40.0 * (1.0 - imbalance);
        }

        // Team stagger: most teammates lunching in the same half hour.
        let clashing = teammate_lunches
            .iter()
            .filter(|&&t| (t - start).abs() < 30)
            .count();
        if clashing * 2 >= teammate_count && clashing > 0 {
            score -= 30.0;
        }

        // Mid-window bonus.
        if (center - ideal_center).abs() <= 30 {
            score += 20.0;
        }

        candidates.push(LunchCandidate { start, score });
        start += SLOT_MINUTES;
    }
    candidates
}

/// Splits one long ABA block to carve a 30-minute lunch hole.
fn split_session_for_lunch(
    therapist_id: &str,
    entries: &mut Vec<ScheduleEntry>,
    ctx: &EngineContext,
    ids: &mut IdMint,
    tracker: &mut AvailabilityTracker,
) {
    let config = &ctx.config;
    let window_start = config.lunch_start;
    let window_end = config.lunch_end;

    let target = entries.iter().position(|e| {
        e.therapist_id == therapist_id
            && e.kind == SessionKind::Aba
            && e.duration() >= SPLITTABLE_ABA
            && e.start < window_end
            && e.end > window_start
    });
    let Some(index) = target else { return };

    let original = entries[index].clone();
    // Prefer a split point leaving a full-length front fragment.
    let hole_start = (original.start + config.aba_min)
        .max(window_start)
        .min(config.latest_lunch_start())
        .max(original.start);
    let hole_end = hole_start + config.lunch_minutes;
    if hole_end > original.end {
        return;
    }
    // The carved lunch itself must not land on a callout.
    let probe = ScheduleEntry::lunch(
        String::new(),
        therapist_id,
        ctx.weekday,
        hole_start,
        config.lunch_minutes,
    );
    if ctx.entry_blocked_by_callout(&probe) {
        return;
    }

    // Shrink the original to the front part; append the back part.
    entries[index].end = hole_start;
    if entries[index].duration() <= 0 {
        entries.remove(index);
    }
    if original.end - hole_end > 0 {
        let mut back = original.clone();
        back.id = ids.next_id();
        back.start = hole_end;
        back.end = original.end;
        entries.push(back);
    }

    let lunch = ScheduleEntry::lunch(
        ids.next_id(),
        therapist_id,
        ctx.weekday,
        hole_start,
        config.lunch_minutes,
    );
    tracker.book_entry(&lunch);
    entries.push(lunch);
}

/// Swaps cross-team entries to same-team qualified therapists where clean.
pub fn team_realign(entries: &mut Vec<ScheduleEntry>, ctx: &EngineContext) {
    for i in 0..entries.len() {
        let entry = &entries[i];
        let Some(client) = entry.client_id.as_deref().and_then(|c| ctx.client(c)) else {
            continue;
        };
        let Some(therapist) = ctx.therapist(&entry.therapist_id) else {
            continue;
        };
        let (Some(client_team), Some(_)) = (&client.team, &therapist.team) else {
            continue;
        };
        if ctx.same_team(client, therapist) {
            continue;
        }

        let mut replacements: Vec<String> = ctx
            .qualified_therapists(client)
            .iter()
            .filter(|t| t.team.as_deref() == Some(client_team.as_str()))
            .filter(|t| match entry.kind.ah_kind() {
                Some(kind) => t.can_deliver(kind),
                None => true,
            })
            .map(|t| t.id.clone())
            .collect();
        replacements.sort();

        for replacement in replacements {
            let mut swapped = entries[i].clone();
            swapped.therapist_id = replacement;
            let id = swapped.id.clone();
            if constraints::can_add(&swapped, entries, Some(id.as_str()), ctx).is_ok() {
                entries[i] = swapped;
                break;
            }
        }
    }
}
