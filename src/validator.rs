//! Full-schedule validation.
//!
//! Runs the constraint kernel across every entry and entry pair, then the
//! aggregate checks that only make sense over the whole day: the Medicaid
//! therapist cap, lunch bookkeeping, weekend rules, therapist load, and
//! client coverage. Emits a deduplicated list of tagged violations.

use std::collections::{HashMap, HashSet};

use crate::constraints;
use crate::context::EngineContext;
use crate::coverage::client_coverage_gaps;
use crate::models::{Role, ScheduleEntry, SessionKind, Violation, ViolationRule};
use crate::time::format_hhmm;

/// Maximum distinct therapists per MD Medicaid client per day.
pub const MEDICAID_THERAPIST_CAP: usize = 3;

/// Billable sessions per therapist above which load is flagged (soft).
pub const COMFORTABLE_SESSION_LOAD: usize = 4;

/// Validates a whole schedule against the run context.
pub fn validate_schedule(entries: &[ScheduleEntry], ctx: &EngineContext) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_pairs(entries, &mut violations);
    check_entries(entries, ctx, &mut violations);
    check_staffable(ctx, &mut violations);
    check_medicaid_cap(entries, ctx, &mut violations);
    check_lunches(entries, ctx, &mut violations);
    check_allied_health(entries, ctx, &mut violations);
    check_therapist_load(entries, ctx, &mut violations);
    check_coverage(entries, ctx, &mut violations);

    dedup(violations)
}

/// Pairwise kernel checks, reported once per pair.
fn check_pairs(entries: &[ScheduleEntry], out: &mut Vec<Violation>) {
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            if !a.overlaps(b) {
                // Adjacency still matters for back-to-back
                if a.therapist_id == b.therapist_id
                    && a.client_id.is_some()
                    && a.client_id == b.client_id
                    && a.weekday == b.weekday
                    && (a.end == b.start || b.end == a.start)
                {
                    out.push(Violation::new(
                        ViolationRule::SameClientBackToBack,
                        &a.therapist_id,
                        format!("entries {} and {} adjoin for the same client", a.id, b.id),
                    ));
                }
                continue;
            }
            if a.therapist_id == b.therapist_id {
                out.push(Violation::new(
                    ViolationRule::TherapistConflict,
                    &a.therapist_id,
                    format!("entries {} and {} overlap", a.id, b.id),
                ));
            }
            if a.client_id.is_some() && a.client_id == b.client_id {
                out.push(Violation::new(
                    ViolationRule::ClientConflict,
                    a.client_id.as_deref().unwrap_or_default(),
                    format!("entries {} and {} overlap", a.id, b.id),
                ));
            }
        }
    }
}

/// Single-entry kernel checks plus the weekend rule.
fn check_entries(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    for entry in entries {
        if constraints::callout_conflict(entry, ctx) {
            out.push(Violation::new(
                ViolationRule::CalloutOverlap,
                &entry.id,
                format!(
                    "entry {} at {}-{} overlaps a callout",
                    entry.id,
                    format_hhmm(entry.start),
                    format_hhmm(entry.end)
                ),
            ));
        }
        if constraints::credential_mismatch(entry, ctx) {
            out.push(Violation::new(
                ViolationRule::CredentialMismatch,
                &entry.id,
                format!(
                    "therapist {} lacks required qualifications for client {}",
                    entry.therapist_id,
                    entry.client_id.as_deref().unwrap_or_default()
                ),
            ));
        }
        if constraints::ah_qualification_missing(entry, ctx) {
            out.push(Violation::new(
                ViolationRule::AhQualificationMissing,
                &entry.id,
                format!(
                    "therapist {} cannot deliver {:?}",
                    entry.therapist_id, entry.kind
                ),
            ));
        }
        if constraints::duration_invalid(entry, ctx) {
            out.push(Violation::new(
                ViolationRule::DurationInvalid,
                &entry.id,
                format!(
                    "entry {} has invalid duration {} min for {:?}",
                    entry.id,
                    entry.duration(),
                    entry.kind
                ),
            ));
        }
        if constraints::outside_operating_hours(entry, ctx) {
            out.push(Violation::new(
                ViolationRule::OutsideOperatingHours,
                &entry.id,
                format!("entry {} leaves the operating window", entry.id),
            ));
        }
        if entry.kind == SessionKind::Aba && ctx.is_weekend() {
            out.push(Violation::new(
                ViolationRule::AbaOnWeekend,
                &entry.id,
                format!("entry {} schedules ABA on a weekend", entry.id),
            ));
        }
    }
}

/// Clients sorted by id, for deterministic violation order.
fn sorted_clients(ctx: &EngineContext) -> Vec<&crate::models::Client> {
    let mut clients: Vec<_> = ctx.clients.values().collect();
    clients.sort_by(|a, b| a.id.cmp(&b.id));
    clients
}

/// Clients whose requirements no therapist in the pool can satisfy.
fn check_staffable(ctx: &EngineContext, out: &mut Vec<Violation>) {
    if ctx.is_weekend() {
        return;
    }
    for client in sorted_clients(ctx) {
        if ctx.qualified_therapists(client).is_empty() {
            out.push(Violation::new(
                ViolationRule::CredentialMismatch,
                &client.id,
                format!(
                    "no therapist satisfies the requirements of client {}",
                    client.id
                ),
            ));
        }
    }
}

/// Distinct-therapist cap for MD Medicaid clients.
fn check_medicaid_cap(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    for client in sorted_clients(ctx) {
        if !client.is_md_medicaid() {
            continue;
        }
        let distinct: HashSet<&str> = entries
            .iter()
            .filter(|e| e.client_id.as_deref() == Some(client.id.as_str()))
            .map(|e| e.therapist_id.as_str())
            .collect();
        if distinct.len() > MEDICAID_THERAPIST_CAP {
            out.push(Violation::new(
                ViolationRule::MdMedicaidLimit,
                &client.id,
                format!(
                    "client {} has {} distinct therapists, cap is {MEDICAID_THERAPIST_CAP}",
                    client.id,
                    distinct.len()
                ),
            ));
        }
    }
}

/// Exactly-one-lunch bookkeeping for working therapists.
fn check_lunches(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    let mut billable: HashMap<&str, i32> = HashMap::new();
    let mut lunches: HashMap<&str, Vec<&ScheduleEntry>> = HashMap::new();
    for entry in entries {
        if entry.is_billable() {
            *billable.entry(entry.therapist_id.as_str()).or_insert(0) += entry.duration();
        } else if entry.is_lunch() {
            lunches.entry(entry.therapist_id.as_str()).or_default().push(entry);
        }
    }

    let mut therapist_ids: Vec<&str> = entries
        .iter()
        .map(|e| e.therapist_id.as_str())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    therapist_ids.sort_unstable();
    for id in therapist_ids {
        let minutes = billable.get(id).copied().unwrap_or(0);
        // The lunch obligation starts at the billable threshold; lighter
        // days may carry a lunch but are not owed one.
        let owes_lunch = minutes >= ctx.config.lunch_threshold;
        let lunch_list = lunches.get(id).map(Vec::as_slice).unwrap_or(&[]);
        match (owes_lunch, lunch_list.len()) {
            (true, 0) => out.push(Violation::new(
                ViolationRule::MissingLunch,
                id,
                format!("therapist {id} works without a lunch"),
            )),
            (_, n) if n > 1 => out.push(Violation::new(
                ViolationRule::MultipleLunches,
                id,
                format!("therapist {id} has {n} lunches"),
            )),
            (false, n) if n > 0 && minutes == 0 => out.push(Violation::new(
                ViolationRule::MultipleLunches,
                id,
                format!("therapist {id} has a lunch but no billable work"),
            )),
            _ => {}
        }
        for lunch in lunch_list {
            if lunch.start < ctx.config.lunch_start || lunch.start > ctx.config.latest_lunch_start()
            {
                out.push(Violation::new(
                    ViolationRule::LunchOutsideWindow,
                    id,
                    format!(
                        "lunch for {id} starts at {}, outside {}-{}",
                        format_hhmm(lunch.start),
                        format_hhmm(ctx.config.lunch_start),
                        format_hhmm(ctx.config.latest_lunch_start())
                    ),
                ));
            }
        }
    }
}

/// Allied-health prescriptions due on this weekday must be on the roster.
fn check_allied_health(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    for client in sorted_clients(ctx) {
        for need in &client.allied_health_needs {
            if !need.allows_weekday(ctx.weekday) {
                continue;
            }
            let met = entries.iter().any(|e| {
                e.client_id.as_deref() == Some(client.id.as_str())
                    && e.kind == SessionKind::from(need.kind)
                    && e.duration() == need.duration_minutes
            });
            if !met {
                out.push(Violation::new(
                    ViolationRule::UnmetAlliedHealth,
                    &client.id,
                    format!(
                        "client {} is owed a {:?} session of {} min",
                        client.id, need.kind, need.duration_minutes
                    ),
                ));
                continue;
            }
            if let Some(window) = &need.preferred_window {
                let in_window = entries.iter().any(|e| {
                    e.client_id.as_deref() == Some(client.id.as_str())
                        && e.kind == SessionKind::from(need.kind)
                        && e.duration() == need.duration_minutes
                        && e.start >= window.start
                        && e.end <= window.end
                });
                if !in_window {
                    out.push(Violation::new(
                        ViolationRule::AhOutsidePreferredWindow,
                        &client.id,
                        format!(
                            "{:?} session for client {} misses its preferred window",
                            need.kind, client.id
                        ),
                    ));
                }
            }
        }
    }
}

/// Soft load checks: session count and idle seniors.
fn check_therapist_load(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    let mut session_count: HashMap<&str, usize> = HashMap::new();
    let mut has_client_time: HashSet<&str> = HashSet::new();
    for entry in entries {
        if entry.is_billable() {
            *session_count.entry(entry.therapist_id.as_str()).or_insert(0) += 1;
        }
        if entry.client_id.is_some() {
            has_client_time.insert(entry.therapist_id.as_str());
        }
    }

    let mut loaded: Vec<(&str, usize)> = session_count
        .iter()
        .filter(|(_, count)| **count > COMFORTABLE_SESSION_LOAD)
        .map(|(id, count)| (*id, *count))
        .collect();
    loaded.sort_unstable();
    for (id, count) in loaded {
        out.push(Violation::new(
            ViolationRule::OverloadedTherapist,
            id,
            format!("therapist {id} carries {count} billable sessions"),
        ));
    }

    if !ctx.is_weekend() && !ctx.clients.is_empty() {
        let mut therapists: Vec<_> = ctx.therapists.values().collect();
        therapists.sort_by(|a, b| a.id.cmp(&b.id));
        for therapist in therapists {
            if therapist.role == Role::Bcba && !has_client_time.contains(therapist.id.as_str()) {
                out.push(Violation::new(
                    ViolationRule::BcbaNoDirectTime,
                    &therapist.id,
                    format!("BCBA {} has no direct client time", therapist.id),
                ));
            }
        }
    }
}

/// Per-client coverage-gap scan.
fn check_coverage(entries: &[ScheduleEntry], ctx: &EngineContext, out: &mut Vec<Violation>) {
    for client in sorted_clients(ctx) {
        for gap in client_coverage_gaps(&client.id, entries, ctx) {
            out.push(
                Violation::new(
                    ViolationRule::CoverageGap,
                    &client.id,
                    format!(
                        "client {} uncovered {}-{}",
                        client.id,
                        format_hhmm(gap.start),
                        format_hhmm(gap.end)
                    ),
                )
                .with_detail(format!("minutes={}", gap.duration())),
            );
        }
    }
}

/// Removes duplicates, preserving first occurrence order.
fn dedup(violations: Vec<Violation>) -> Vec<Violation> {
    let mut seen: HashSet<(ViolationRule, String, String)> = HashSet::new();
    violations
        .into_iter()
        .filter(|v| seen.insert((v.rule, v.entity_id.clone(), v.message.clone())))
        .collect()
}
