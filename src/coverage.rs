//! Client coverage-gap computation.
//!
//! Each client owes a full day of coverage: every 15-minute interval of
//! the operating window must be absorbed by a client callout or one of
//! the client's entries. Whatever survives the subtraction is a gap.
//! Weekends owe nothing.

use crate::context::EngineContext;
use crate::models::{CalloutTarget, ScheduleEntry};
use crate::time::{SLOT_MINUTES, TimeRange};

/// Subtracts a window from every residual piece.
fn subtract_all(residual: Vec<TimeRange>, window: &TimeRange) -> Vec<TimeRange> {
    residual
        .into_iter()
        .flat_map(|piece| piece.subtract(window))
        .collect()
}

/// Uncovered intervals of one client's operating day.
///
/// Subtracts the client's callout windows and every scheduled entry of
/// the client from the operating window, in either order (subtraction
/// commutes), and returns the residual intervals sorted by start.
pub fn client_coverage_gaps(
    client_id: &str,
    entries: &[ScheduleEntry],
    ctx: &EngineContext,
) -> Vec<TimeRange> {
    if ctx.is_weekend() {
        return Vec::new();
    }

    let mut residual = vec![TimeRange::new(ctx.config.op_start, ctx.config.op_end)];

    for callout in ctx.callouts_for(CalloutTarget::Client, client_id) {
        residual = subtract_all(residual, &callout.window);
        if residual.is_empty() {
            return residual;
        }
    }

    for entry in entries {
        if entry.client_id.as_deref() != Some(client_id) {
            continue;
        }
        residual = subtract_all(residual, &entry.span());
        if residual.is_empty() {
            break;
        }
    }

    residual.sort_by_key(|r| r.start);
    residual
}

/// Total gap size in 15-minute slots.
pub fn total_gap_slots(gaps: &[TimeRange]) -> usize {
    gaps.iter()
        .map(|g| (g.duration() / SLOT_MINUTES).max(0) as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Callout, Client, ScheduleEntry, SessionKind, Therapist, Role};
    use chrono::{NaiveDate, Weekday};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn context(callouts: Vec<Callout>) -> EngineContext {
        EngineContext::new(
            EngineConfig::default(),
            monday(),
            vec![Client::new("c1")],
            vec![Therapist::new("t1", Role::Rbt)],
            callouts,
        )
    }

    fn aba(id: &str, start: i32, end: i32) -> ScheduleEntry {
        ScheduleEntry::new(id, "c1", "t1", Weekday::Mon, start, end, SessionKind::Aba)
    }

    #[test]
    fn test_empty_schedule_is_one_big_gap() {
        let ctx = context(vec![]);
        let gaps = client_coverage_gaps("c1", &[], &ctx);
        assert_eq!(gaps, vec![TimeRange::new(480, 1020)]);
        assert_eq!(total_gap_slots(&gaps), 36);
    }

    #[test]
    fn test_full_coverage_has_no_gaps() {
        let ctx = context(vec![]);
        let entries = vec![aba("e1", 480, 660), aba("e2", 660, 840), aba("e3", 840, 1020)];
        assert!(client_coverage_gaps("c1", &entries, &ctx).is_empty());
    }

    #[test]
    fn test_gap_between_sessions() {
        let ctx = context(vec![]);
        let entries = vec![aba("e1", 480, 660), aba("e2", 720, 900)];
        let gaps = client_coverage_gaps("c1", &entries, &ctx);
        assert_eq!(gaps, vec![TimeRange::new(660, 720), TimeRange::new(900, 1020)]);
        assert_eq!(total_gap_slots(&gaps), 4 + 8);
    }

    #[test]
    fn test_callout_absorbs_coverage() {
        let callout = Callout::new(
            "co1",
            CalloutTarget::Client,
            "c1",
            monday(),
            crate::time::TimeRange::new(480, 660),
        );
        let ctx = context(vec![callout]);
        let entries = vec![aba("e1", 660, 840), aba("e2", 840, 1020)];
        assert!(client_coverage_gaps("c1", &entries, &ctx).is_empty());
    }

    #[test]
    fn test_ah_entries_count_as_coverage() {
        let ctx = context(vec![]);
        let mut entries = vec![aba("e1", 480, 660), aba("e2", 705, 1020)];
        entries.push(ScheduleEntry::new(
            "e3", "c1", "t1", Weekday::Mon, 660, 705, SessionKind::AhOt,
        ));
        assert!(client_coverage_gaps("c1", &entries, &ctx).is_empty());
    }

    #[test]
    fn test_weekend_owes_nothing() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let ctx = EngineContext::new(
            EngineConfig::default(),
            saturday,
            vec![Client::new("c1")],
            vec![],
            vec![],
        );
        assert!(client_coverage_gaps("c1", &[], &ctx).is_empty());
    }

    #[test]
    fn test_other_clients_do_not_cover() {
        let ctx = context(vec![]);
        let other = ScheduleEntry::new("e1", "c2", "t1", Weekday::Mon, 480, 1020, SessionKind::Aba);
        let gaps = client_coverage_gaps("c1", &[other], &ctx);
        assert_eq!(gaps, vec![TimeRange::new(480, 1020)]);
    }
}
