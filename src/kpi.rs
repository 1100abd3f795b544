//! Roster quality metrics.
//!
//! Computes the indicators clinic leads actually look at on a finished
//! roster: how much of the day is billable, how completely clients are
//! covered, how evenly therapists are loaded, and whether lunches and
//! team assignments came out right.

use std::collections::HashMap;

use crate::context::EngineContext;
use crate::coverage::client_coverage_gaps;
use crate::models::DaySchedule;
use crate::time::Minutes;

/// Roster performance indicators.
#[derive(Debug, Clone)]
pub struct RosterKpi {
    /// Total billable minutes across the roster.
    pub total_billable_minutes: Minutes,
    /// Fraction of required client time actually covered (0.0..1.0).
    pub coverage_rate: f64,
    /// Billable minutes per working therapist.
    pub billable_by_therapist: HashMap<String, Minutes>,
    /// Fraction of lunch-owing therapists with a lunch in place.
    pub lunch_compliance: f64,
    /// Fraction of client-bearing entries placed within the client's team.
    pub team_alignment_rate: f64,
}

impl RosterKpi {
    /// Computes KPIs for a schedule against its run context.
    pub fn calculate(schedule: &DaySchedule, ctx: &EngineContext) -> Self {
        let mut billable_by_therapist: HashMap<String, Minutes> = HashMap::new();
        let mut total_billable = 0;
        for entry in &schedule.entries {
            if entry.is_billable() {
                *billable_by_therapist
                    .entry(entry.therapist_id.clone())
                    .or_insert(0) += entry.duration();
                total_billable += entry.duration();
            }
        }

        // Coverage: owed minutes minus residual gaps, per client.
        let owed_per_client = (ctx.config.op_end - ctx.config.op_start).max(0);
        let mut owed = 0i64;
        let mut gap_minutes = 0i64;
        if !ctx.is_weekend() {
            for client in ctx.clients.values() {
                owed += owed_per_client as i64;
                gap_minutes += client_coverage_gaps(&client.id, &schedule.entries, ctx)
                    .iter()
                    .map(|g| g.duration() as i64)
                    .sum::<i64>();
            }
        }
        let coverage_rate = if owed == 0 {
            1.0
        } else {
            (owed - gap_minutes) as f64 / owed as f64
        };

        // Lunch compliance among therapists owing one.
        let mut owing = 0usize;
        let mut compliant = 0usize;
        for (therapist_id, minutes) in &billable_by_therapist {
            if *minutes >= ctx.config.lunch_threshold {
                owing += 1;
                if !schedule.lunches_for(therapist_id).is_empty() {
                    compliant += 1;
                }
            }
        }
        let lunch_compliance = if owing == 0 {
            1.0
        } else {
            compliant as f64 / owing as f64
        };

        // Team alignment across client-bearing entries.
        let mut teamed = 0usize;
        let mut aligned = 0usize;
        for entry in &schedule.entries {
            let Some(client) = entry.client_id.as_deref().and_then(|c| ctx.client(c)) else {
                continue;
            };
            let Some(therapist) = ctx.therapist(&entry.therapist_id) else {
                continue;
            };
            if client.team.is_some() && therapist.team.is_some() {
                teamed += 1;
                if ctx.same_team(client, therapist) {
                    aligned += 1;
                }
            }
        }
        let team_alignment_rate = if teamed == 0 {
            1.0
        } else {
            aligned as f64 / teamed as f64
        };

        Self {
            total_billable_minutes: total_billable,
            coverage_rate,
            billable_by_therapist,
            lunch_compliance,
            team_alignment_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Client, Role, ScheduleEntry, SessionKind, Therapist};
    use chrono::{NaiveDate, Weekday};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn context() -> EngineContext {
        let clients = vec![Client::new("c1").with_team("blue")];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt).with_team("blue"),
            Therapist::new("t2", Role::Rbt).with_team("red"),
        ];
        EngineContext::new(EngineConfig::default(), monday(), clients, therapists, vec![])
    }

    fn aba(id: &str, therapist: &str, start: i32, end: i32) -> ScheduleEntry {
        ScheduleEntry::new(id, "c1", therapist, Weekday::Mon, start, end, SessionKind::Aba)
    }

    #[test]
    fn test_kpi_full_day() {
        let ctx = context();
        let mut schedule = DaySchedule::new(monday());
        schedule.add_entry(aba("e1", "t1", 480, 660));
        schedule.add_entry(aba("e2", "t2", 660, 840));
        schedule.add_entry(aba("e3", "t1", 840, 1020));
        schedule.add_entry(ScheduleEntry::lunch("l1", "t1", Weekday::Mon, 690, 30));

        let kpi = RosterKpi::calculate(&schedule, &ctx);
        assert_eq!(kpi.total_billable_minutes, 540);
        assert!((kpi.coverage_rate - 1.0).abs() < 1e-9);
        assert!((kpi.lunch_compliance - 1.0).abs() < 1e-9);
        // Two of three client entries are on the client's team
        assert!((kpi.team_alignment_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(kpi.billable_by_therapist["t1"], 360);
    }

    #[test]
    fn test_kpi_partial_coverage() {
        let ctx = context();
        let mut schedule = DaySchedule::new(monday());
        schedule.add_entry(aba("e1", "t1", 480, 750)); // half the day

        let kpi = RosterKpi::calculate(&schedule, &ctx);
        assert!((kpi.coverage_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_kpi_empty_schedule() {
        let ctx = context();
        let schedule = DaySchedule::new(monday());
        let kpi = RosterKpi::calculate(&schedule, &ctx);
        assert_eq!(kpi.total_billable_minutes, 0);
        assert!((kpi.coverage_rate - 0.0).abs() < 1e-9);
        assert!((kpi.lunch_compliance - 1.0).abs() < 1e-9);
    }
}
