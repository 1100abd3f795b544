//! Constraint kernel.
//!
//! Pure predicates over one entry against a partial schedule. Every
//! predicate optionally ignores one entry by id, which is how edits are
//! re-checked in place. `can_add` aggregates the kernel into a single
//! accept/reject decision with tagged violations.

use crate::context::EngineContext;
use crate::models::{ScheduleEntry, SessionKind, Violation, ViolationRule};
use crate::time::{format_hhmm, on_grid};

/// Whether another entry of the same therapist overlaps `entry`.
pub fn therapist_conflict(
    entry: &ScheduleEntry,
    schedule: &[ScheduleEntry],
    ignore: Option<&str>,
) -> bool {
    schedule.iter().any(|other| {
        other.id != entry.id
            && Some(other.id.as_str()) != ignore
            && other.therapist_id == entry.therapist_id
            && other.overlaps(entry)
    })
}

/// Whether another entry of the same client overlaps `entry`.
///
/// Entries without a client (lunch, admin) never conflict by client.
pub fn client_conflict(
    entry: &ScheduleEntry,
    schedule: &[ScheduleEntry],
    ignore: Option<&str>,
) -> bool {
    let Some(client_id) = &entry.client_id else {
        return false;
    };
    schedule.iter().any(|other| {
        other.id != entry.id
            && Some(other.id.as_str()) != ignore
            && other.client_id.as_deref() == Some(client_id)
            && other.overlaps(entry)
    })
}

/// Whether a callout matching the entry's therapist or client blocks it.
pub fn callout_conflict(entry: &ScheduleEntry, ctx: &EngineContext) -> bool {
    ctx.entry_blocked_by_callout(entry)
}

/// Whether the therapist fails the client's insurance requirements.
pub fn credential_mismatch(entry: &ScheduleEntry, ctx: &EngineContext) -> bool {
    let Some(client_id) = &entry.client_id else {
        return false;
    };
    match (ctx.client(client_id), ctx.therapist(&entry.therapist_id)) {
        (Some(client), Some(therapist)) => !therapist.satisfies(&client.insurance_requirements),
        // Unknown entities are caught by request validation
        _ => false,
    }
}

/// Whether an allied-health entry's therapist cannot deliver its kind.
pub fn ah_qualification_missing(entry: &ScheduleEntry, ctx: &EngineContext) -> bool {
    let Some(kind) = entry.kind.ah_kind() else {
        return false;
    };
    match ctx.therapist(&entry.therapist_id) {
        Some(therapist) => !therapist.can_deliver(kind),
        None => false,
    }
}

/// Whether the entry's duration breaks its kind's bounds.
///
/// ABA must fall in the configured range, lunch must be exactly the lunch
/// length, and an allied-health session must match one of the client's
/// prescribed durations.
pub fn duration_invalid(entry: &ScheduleEntry, ctx: &EngineContext) -> bool {
    let duration = entry.duration();
    if duration <= 0 {
        return true;
    }
    match entry.kind {
        SessionKind::Aba => {
            entry.client_id.is_some()
                && (duration < ctx.config.aba_min || duration > ctx.config.aba_max)
        }
        SessionKind::IndirectTime => duration != ctx.config.lunch_minutes,
        SessionKind::AhOt | SessionKind::AhSlp => {
            let Some(kind) = entry.kind.ah_kind() else {
                return false;
            };
            let Some(client_id) = &entry.client_id else {
                return true;
            };
            match ctx.client(client_id) {
                Some(client) => !client
                    .allied_health_needs
                    .iter()
                    .any(|n| n.kind == kind && n.duration_minutes == duration),
                None => false,
            }
        }
        SessionKind::AdminTime => false,
    }
}

/// Whether a non-lunch entry leaves the operating window or the grid.
pub fn outside_operating_hours(entry: &ScheduleEntry, ctx: &EngineContext) -> bool {
    if entry.is_lunch() {
        return false;
    }
    entry.start >= entry.end
        || !on_grid(entry.start)
        || !on_grid(entry.end)
        || entry.start < ctx.config.op_start
        || entry.end > ctx.config.op_end
}

/// Whether another entry of the same (therapist, client) directly adjoins.
pub fn same_client_back_to_back(
    entry: &ScheduleEntry,
    schedule: &[ScheduleEntry],
    ignore: Option<&str>,
) -> bool {
    let Some(client_id) = &entry.client_id else {
        return false;
    };
    schedule.iter().any(|other| {
        other.id != entry.id
            && Some(other.id.as_str()) != ignore
            && other.therapist_id == entry.therapist_id
            && other.client_id.as_deref() == Some(client_id)
            && other.weekday == entry.weekday
            && (other.end == entry.start || entry.end == other.start)
    })
}

/// Runs the whole kernel against one candidate entry.
///
/// Returns `Ok(())` when the entry may be added (or kept after an edit,
/// with `ignore` naming its previous version), else every violation found.
pub fn can_add(
    entry: &ScheduleEntry,
    schedule: &[ScheduleEntry],
    ignore: Option<&str>,
    ctx: &EngineContext,
) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    let span = format!(
        "{}-{}",
        format_hhmm(entry.start),
        format_hhmm(entry.end)
    );

    if therapist_conflict(entry, schedule, ignore) {
        violations.push(Violation::new(
            ViolationRule::TherapistConflict,
            &entry.therapist_id,
            format!("therapist {} double-booked at {span}", entry.therapist_id),
        ));
    }
    if client_conflict(entry, schedule, ignore) {
        let client_id = entry.client_id.as_deref().unwrap_or_default();
        violations.push(Violation::new(
            ViolationRule::ClientConflict,
            client_id,
            format!("client {client_id} double-booked at {span}"),
        ));
    }
    if callout_conflict(entry, ctx) {
        violations.push(Violation::new(
            ViolationRule::CalloutOverlap,
            &entry.id,
            format!("entry at {span} overlaps a callout"),
        ));
    }
    if credential_mismatch(entry, ctx) {
        violations.push(Violation::new(
            ViolationRule::CredentialMismatch,
            &entry.id,
            format!(
                "therapist {} lacks required qualifications for client {}",
                entry.therapist_id,
                entry.client_id.as_deref().unwrap_or_default()
            ),
        ));
    }
    if ah_qualification_missing(entry, ctx) {
        violations.push(Violation::new(
            ViolationRule::AhQualificationMissing,
            &entry.id,
            format!(
                "therapist {} cannot deliver {:?}",
                entry.therapist_id, entry.kind
            ),
        ));
    }
    if duration_invalid(entry, ctx) {
        violations.push(Violation::new(
            ViolationRule::DurationInvalid,
            &entry.id,
            format!("invalid duration {} min for {:?}", entry.duration(), entry.kind),
        ));
    }
    if outside_operating_hours(entry, ctx) {
        violations.push(Violation::new(
            ViolationRule::OutsideOperatingHours,
            &entry.id,
            format!("entry at {span} leaves the operating window"),
        ));
    }
    if same_client_back_to_back(entry, schedule, ignore) {
        violations.push(Violation::new(
            ViolationRule::SameClientBackToBack,
            &entry.id,
            format!(
                "therapist {} adjoins client {} sessions at {span}",
                entry.therapist_id,
                entry.client_id.as_deref().unwrap_or_default()
            ),
        ));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{
        AhKind, AlliedHealthNeed, Callout, CalloutTarget, Client, Role, Therapist,
    };
    use crate::time::TimeRange;
    use chrono::{NaiveDate, Weekday};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn context() -> EngineContext {
        let clients = vec![
            Client::new("c1")
                .with_requirement("MD_MEDICAID")
                .with_allied_health(AlliedHealthNeed::new(AhKind::Ot, 45)),
        ];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt)
                .with_qualification("MD_MEDICAID")
                .with_qualification("OT Certified")
                .with_allied_health(AhKind::Ot),
            Therapist::new("t2", Role::Bcba),
        ];
        let callouts = vec![Callout::new(
            "co1",
            CalloutTarget::Therapist,
            "t1",
            monday(),
            TimeRange::new(720, 750),
        )];
        EngineContext::new(EngineConfig::default(), monday(), clients, therapists, callouts)
    }

    fn aba(id: &str, therapist: &str, start: i32, end: i32) -> ScheduleEntry {
        ScheduleEntry::new(id, "c1", therapist, Weekday::Mon, start, end, SessionKind::Aba)
    }

    #[test]
    fn test_therapist_and_client_conflicts() {
        let existing = vec![aba("e1", "t1", 480, 540)];
        let overlapping = aba("e2", "t1", 510, 570);
        assert!(therapist_conflict(&overlapping, &existing, None));
        assert!(client_conflict(&overlapping, &existing, None));

        // Ignoring the existing entry clears both
        assert!(!therapist_conflict(&overlapping, &existing, Some("e1")));
        assert!(!client_conflict(&overlapping, &existing, Some("e1")));

        // Lunch never conflicts by client
        let lunch = ScheduleEntry::lunch("e3", "t2", Weekday::Mon, 510, 30);
        assert!(!client_conflict(&lunch, &existing, None));
    }

    #[test]
    fn test_callout_and_credential() {
        let ctx = context();
        assert!(callout_conflict(&aba("e1", "t1", 700, 760), &ctx));
        assert!(!callout_conflict(&aba("e2", "t1", 480, 540), &ctx));

        // t2 lacks MD_MEDICAID
        assert!(credential_mismatch(&aba("e3", "t2", 480, 540), &ctx));
        assert!(!credential_mismatch(&aba("e4", "t1", 480, 540), &ctx));
    }

    #[test]
    fn test_ah_qualification() {
        let ctx = context();
        let ot = ScheduleEntry::new("e1", "c1", "t1", Weekday::Mon, 540, 585, SessionKind::AhOt);
        assert!(!ah_qualification_missing(&ot, &ctx));

        let bad = ScheduleEntry::new("e2", "c1", "t2", Weekday::Mon, 540, 585, SessionKind::AhOt);
        assert!(ah_qualification_missing(&bad, &ctx));
    }

    #[test]
    fn test_duration_rules() {
        let ctx = context();
        assert!(duration_invalid(&aba("e1", "t1", 480, 525), &ctx)); // 45 < 60
        assert!(duration_invalid(&aba("e2", "t1", 480, 675), &ctx)); // 195 > 180
        assert!(!duration_invalid(&aba("e3", "t1", 480, 540), &ctx));

        // Lunch must be exactly 30
        let long_lunch = ScheduleEntry {
            end: 765,
            ..ScheduleEntry::lunch("e4", "t1", Weekday::Mon, 720, 30)
        };
        assert!(duration_invalid(&long_lunch, &ctx));

        // AH must match a prescribed duration
        let ot = ScheduleEntry::new("e5", "c1", "t1", Weekday::Mon, 540, 585, SessionKind::AhOt);
        assert!(!duration_invalid(&ot, &ctx));
        let ot_wrong = ScheduleEntry::new("e6", "c1", "t1", Weekday::Mon, 540, 600, SessionKind::AhOt);
        assert!(duration_invalid(&ot_wrong, &ctx));
    }

    #[test]
    fn test_operating_hours() {
        let ctx = context();
        assert!(outside_operating_hours(&aba("e1", "t1", 420, 540), &ctx)); // before 08:00
        assert!(outside_operating_hours(&aba("e2", "t1", 960, 1080), &ctx)); // past 17:00
        assert!(outside_operating_hours(&aba("e3", "t1", 482, 542), &ctx)); // off grid
        assert!(!outside_operating_hours(&aba("e4", "t1", 480, 600), &ctx));
    }

    #[test]
    fn test_back_to_back() {
        let existing = vec![aba("e1", "t1", 540, 600)];
        // Touching after
        assert!(same_client_back_to_back(&aba("e2", "t1", 600, 660), &existing, None));
        // Touching before
        assert!(same_client_back_to_back(&aba("e3", "t1", 480, 540), &existing, None));
        // Gap of 15 minutes is fine
        assert!(!same_client_back_to_back(&aba("e4", "t1", 615, 675), &existing, None));
        // Different therapist is fine
        assert!(!same_client_back_to_back(&aba("e5", "t2", 600, 660), &existing, None));
    }

    #[test]
    fn test_can_add_aggregates() {
        let ctx = context();
        let existing = vec![aba("e1", "t1", 480, 540)];

        assert!(can_add(&aba("e2", "t1", 555, 660), &existing, None, &ctx).is_ok());

        let bad = aba("e3", "t2", 510, 555); // conflicts + credential
        let violations = can_add(&bad, &existing, None, &ctx).unwrap_err();
        let rules: Vec<_> = violations.iter().map(|v| v.rule).collect();
        assert!(rules.contains(&ViolationRule::ClientConflict));
        assert!(rules.contains(&ViolationRule::CredentialMismatch));
        assert!(!rules.contains(&ViolationRule::TherapistConflict));
    }
}
