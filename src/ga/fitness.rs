//! Fitness evaluation.
//!
//! A schedule's fitness is a weighted sum over its violation counts plus
//! structural badness (fragmentation and lunch stagger). Weights scale
//! with an adaptive factor so hard violations stay dominant as the
//! problem grows; counts are capped to bound outliers. Lower is better;
//! zero means feasible and fair.

use std::collections::HashMap;

use crate::context::EngineContext;
use crate::models::{ScheduleEntry, Violation, ViolationRule};
use crate::validator::validate_schedule;

/// Fitness evaluator bound to one run context.
pub struct FitnessEvaluator<'a> {
    ctx: &'a EngineContext,
    sigma: f64,
}

impl<'a> FitnessEvaluator<'a> {
    /// Creates an evaluator; σ = max(1, log2(|clients|·|therapists|)).
    pub fn new(ctx: &'a EngineContext) -> Self {
        let product = (ctx.clients.len() * ctx.therapists.len()).max(1) as f64;
        let sigma = product.log2().max(1.0);
        Self { ctx, sigma }
    }

    /// The adaptive scale factor.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Validates and scores a schedule.
    pub fn evaluate(&self, entries: &[ScheduleEntry]) -> (f64, Vec<Violation>) {
        let violations = validate_schedule(entries, self.ctx);
        let score = self.score(entries, &violations);
        (score, violations)
    }

    /// Scores a schedule given its violations.
    pub fn score(&self, entries: &[ScheduleEntry], violations: &[Violation]) -> f64 {
        let sigma = self.sigma;
        let mut counts: HashMap<ViolationRule, usize> = HashMap::new();
        for violation in violations {
            *counts.entry(violation.rule).or_insert(0) += 1;
        }
        let count = |rule: ViolationRule| counts.get(&rule).copied().unwrap_or(0);
        let capped = |rule: ViolationRule, cap: usize| count(rule).min(cap) as f64;

        let mut total = 0.0;

        total += 5000.0 * sigma * capped(ViolationRule::TherapistConflict, 5);
        total += 5000.0 * sigma * capped(ViolationRule::ClientConflict, 5);
        total += 6000.0 * sigma * count(ViolationRule::SameClientBackToBack) as f64;

        let mismatch =
            count(ViolationRule::CredentialMismatch) + count(ViolationRule::AhQualificationMissing);
        total += 4000.0 * sigma * mismatch.min(5) as f64;

        total += 4500.0 * sigma * capped(ViolationRule::CalloutOverlap, 5);

        let lunch_count =
            count(ViolationRule::MissingLunch) + count(ViolationRule::MultipleLunches);
        total += 2500.0 * sigma * lunch_count.min(self.ctx.therapists.len().max(1)) as f64;
        total += 200.0 * sigma * count(ViolationRule::LunchOutsideWindow) as f64;
        total += 200.0 * sigma * count(ViolationRule::AhOutsidePreferredWindow) as f64;

        total += 1000.0 * sigma * count(ViolationRule::DurationInvalid) as f64;
        total += 1500.0 * sigma * count(ViolationRule::UnmetAlliedHealth) as f64;
        total += 2000.0 * sigma * count(ViolationRule::MdMedicaidLimit) as f64;
        total += 4000.0 * sigma * count(ViolationRule::OutsideOperatingHours) as f64;
        total += 4000.0 * sigma * count(ViolationRule::AbaOnWeekend) as f64;

        total += self.coverage_penalty(violations);

        total += 100.0 * sigma * count(ViolationRule::TeamMismatch) as f64;
        total += 100.0 * sigma * count(ViolationRule::OverloadedTherapist) as f64;
        total += 100.0 * sigma * count(ViolationRule::BcbaNoDirectTime) as f64;

        total += 800.0 * sigma * self.stagger_pairs(entries) as f64;
        total += 10.0 * self.fragmentation_minutes(entries) as f64;

        total
    }

    /// Coverage penalty: gap hours, capped, scaled by client count.
    fn coverage_penalty(&self, violations: &[Violation]) -> f64 {
        let gap_minutes: i64 = violations
            .iter()
            .filter(|v| v.rule == ViolationRule::CoverageGap)
            .filter_map(|v| {
                v.detail
                    .as_deref()
                    .and_then(|d| d.strip_prefix("minutes="))
                    .and_then(|m| m.parse::<i64>().ok())
            })
            .sum();
        let clients = self.ctx.clients.len();
        let gap_hours = (gap_minutes as f64 / 60.0).min(2.0 * clients as f64);
        2000.0 * self.sigma * (clients as f64 / 10.0) * gap_hours
    }

    /// Teammate lunch pairs starting within the same half hour.
    fn stagger_pairs(&self, entries: &[ScheduleEntry]) -> usize {
        let mut by_team: HashMap<&str, Vec<i32>> = HashMap::new();
        for entry in entries {
            if !entry.is_lunch() {
                continue;
            }
            if let Some(team) = self
                .ctx
                .therapist(&entry.therapist_id)
                .and_then(|t| t.team.as_deref())
            {
                by_team.entry(team).or_default().push(entry.start);
            }
        }

        let mut pairs = 0;
        for starts in by_team.values() {
            for (i, a) in starts.iter().enumerate() {
                for b in &starts[i + 1..] {
                    if (a - b).abs() < 30 {
                        pairs += 1;
                    }
                }
            }
        }
        pairs
    }

    /// Idle minutes between a therapist's non-lunch entries.
    ///
    /// Holes that hold or touch the therapist's lunch are the lunch break
    /// itself and cost nothing; every other hole counts per minute.
    fn fragmentation_minutes(&self, entries: &[ScheduleEntry]) -> i64 {
        let mut by_therapist: HashMap<&str, Vec<&ScheduleEntry>> = HashMap::new();
        let mut lunches: HashMap<&str, Vec<&ScheduleEntry>> = HashMap::new();
        for entry in entries {
            if entry.is_lunch() {
                lunches.entry(entry.therapist_id.as_str()).or_default().push(entry);
            } else {
                by_therapist
                    .entry(entry.therapist_id.as_str())
                    .or_default()
                    .push(entry);
            }
        }

        let mut idle: i64 = 0;
        for (therapist_id, list) in &mut by_therapist {
            list.sort_by_key(|e| e.start);
            for pair in list.windows(2) {
                let hole = pair[1].start - pair[0].end;
                if hole <= 0 {
                    continue;
                }
                let lunch_break = lunches
                    .get(therapist_id)
                    .map(|ls| {
                        ls.iter()
                            .any(|l| l.start <= pair[1].start && l.end >= pair[0].end)
                    })
                    .unwrap_or(false);
                if !lunch_break {
                    idle += hole as i64;
                }
            }
        }
        idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Client, Role, SessionKind, Therapist};
    use chrono::{NaiveDate, Weekday};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn context() -> EngineContext {
        let clients = vec![Client::new("c1").with_requirement("MD_MEDICAID")];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
            Therapist::new("t2", Role::Rbt).with_qualification("MD_MEDICAID"),
        ];
        EngineContext::new(EngineConfig::default(), monday(), clients, therapists, vec![])
    }

    fn aba(id: &str, therapist: &str, start: i32, end: i32) -> ScheduleEntry {
        ScheduleEntry::new(id, "c1", therapist, Weekday::Mon, start, end, SessionKind::Aba)
    }

    /// Fully covered day: t1 takes the edges with a lunch in the middle
    /// hole, t2 takes the middle block (under the lunch threshold).
    fn perfect_entries() -> Vec<ScheduleEntry> {
        vec![
            aba("e1", "t1", 480, 660),
            aba("e2", "t2", 660, 840),
            aba("e3", "t1", 840, 1020),
            ScheduleEntry::lunch("l1", "t1", Weekday::Mon, 690, 30),
        ]
    }

    #[test]
    fn test_sigma_floor() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        // 1 client x 2 therapists → log2(2) = 1.0
        assert!((eval.sigma() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_perfect_schedule_scores_zero() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        let (fitness, violations) = eval.evaluate(&perfect_entries());
        assert!(violations.is_empty(), "unexpected: {violations:?}");
        assert_eq!(fitness, 0.0);
    }

    #[test]
    fn test_hard_violation_dominates() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        // Overlapping sessions for t1
        let entries = vec![aba("e1", "t1", 480, 600), aba("e2", "t1", 540, 660)];
        let (fitness, violations) = eval.evaluate(&entries);
        assert!(violations.iter().any(|v| v.rule == ViolationRule::TherapistConflict));
        assert!(fitness >= 5000.0);
    }

    #[test]
    fn test_conflict_counts_capped() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        let mut violations = Vec::new();
        for i in 0..20 {
            violations.push(Violation::new(
                ViolationRule::TherapistConflict,
                "t1",
                format!("conflict {i}"),
            ));
        }
        let score = eval.score(&[], &violations);
        // Capped at 5
        assert!((score - 5.0 * 5000.0 * eval.sigma()).abs() < 1e-6);
    }

    #[test]
    fn test_fragmentation_counts_idle_minutes() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        // 45-minute hole with no lunch in it
        let entries = vec![aba("e1", "t1", 480, 600), aba("e2", "t1", 645, 765)];
        let frag = eval.fragmentation_minutes(&entries);
        assert_eq!(frag, 45);

        // A hole holding the lunch is the lunch break, not fragmentation
        let mut with_lunch = entries.clone();
        with_lunch.push(ScheduleEntry::lunch("l1", "t1", Weekday::Mon, 600, 30));
        assert_eq!(eval.fragmentation_minutes(&with_lunch), 0);

        // A second hole elsewhere still counts
        let mut two_holes = with_lunch.clone();
        two_holes.push(aba("e3", "t1", 810, 930));
        assert_eq!(eval.fragmentation_minutes(&two_holes), 45);
    }

    #[test]
    fn test_stagger_pairs() {
        let clients = vec![Client::new("c1")];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt).with_team("blue"),
            Therapist::new("t2", Role::Rbt).with_team("blue"),
            Therapist::new("t3", Role::Rbt).with_team("red"),
        ];
        let ctx =
            EngineContext::new(EngineConfig::default(), monday(), clients, therapists, vec![]);
        let eval = FitnessEvaluator::new(&ctx);

        let entries = vec![
            ScheduleEntry::lunch("l1", "t1", Weekday::Mon, 720, 30),
            ScheduleEntry::lunch("l2", "t2", Weekday::Mon, 735, 30),
            ScheduleEntry::lunch("l3", "t3", Weekday::Mon, 720, 30),
        ];
        // t1/t2 clash within the same team; t3 is another team
        assert_eq!(eval.stagger_pairs(&entries), 1);

        let spread = vec![
            ScheduleEntry::lunch("l1", "t1", Weekday::Mon, 690, 30),
            ScheduleEntry::lunch("l2", "t2", Weekday::Mon, 750, 30),
        ];
        assert_eq!(eval.stagger_pairs(&spread), 0);
    }

    #[test]
    fn test_coverage_penalty_scales_with_gap() {
        let ctx = context();
        let eval = FitnessEvaluator::new(&ctx);
        let small = vec![aba("e1", "t1", 480, 960)]; // 1h gap at day end
        let large = vec![aba("e2", "t1", 480, 840)]; // 3h gap
        let (f_small, _) = eval.evaluate(&small);
        let (f_large, _) = eval.evaluate(&large);
        assert!(f_large > f_small);
    }
}
