//! Per-run scheduling context.
//!
//! The context is the immutable snapshot taken at `run` entry: entity
//! lookup maps, the date and weekday under construction, and the callouts
//! that cover that date. Everything downstream (kernel, validator, seeder,
//! repair, fitness) reads through it; nothing mutates it.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::models::{AhKind, Callout, CalloutTarget, Client, ScheduleEntry, Therapist};

/// Immutable inputs for one engine run.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Engine configuration.
    pub config: EngineConfig,
    /// Date being scheduled.
    pub date: NaiveDate,
    /// Weekday of `date`.
    pub weekday: Weekday,
    /// Clients by id.
    pub clients: HashMap<String, Client>,
    /// Therapists by id.
    pub therapists: HashMap<String, Therapist>,
    /// Callouts whose date range covers `date`.
    pub callouts: Vec<Callout>,
}

impl EngineContext {
    /// Snapshots the inputs for a run.
    pub fn new(
        config: EngineConfig,
        date: NaiveDate,
        clients: Vec<Client>,
        therapists: Vec<Therapist>,
        callouts: Vec<Callout>,
    ) -> Self {
        let weekday = date.weekday();
        let clients = clients.into_iter().map(|c| (c.id.clone(), c)).collect();
        let therapists = therapists.into_iter().map(|t| (t.id.clone(), t)).collect();
        let callouts = callouts
            .into_iter()
            .filter(|c| c.covers_date(date))
            .collect();
        Self {
            config,
            date,
            weekday,
            clients,
            therapists,
            callouts,
        }
    }

    /// Looks up a client.
    pub fn client(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Looks up a therapist.
    pub fn therapist(&self, id: &str) -> Option<&Therapist> {
        self.therapists.get(id)
    }

    /// Whether the scheduled date is a weekend.
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }

    /// Therapists satisfying every insurance requirement of a client.
    pub fn qualified_therapists(&self, client: &Client) -> Vec<&Therapist> {
        let mut out: Vec<&Therapist> = self
            .therapists
            .values()
            .filter(|t| t.satisfies(&client.insurance_requirements))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Qualified therapists that can also deliver an allied-health kind.
    pub fn ah_qualified_therapists(&self, client: &Client, kind: AhKind) -> Vec<&Therapist> {
        self.qualified_therapists(client)
            .into_iter()
            .filter(|t| t.can_deliver(kind))
            .collect()
    }

    /// Callouts targeting one entity on the run date.
    pub fn callouts_for(&self, target: CalloutTarget, entity_id: &str) -> Vec<&Callout> {
        self.callouts
            .iter()
            .filter(|c| c.target == target && c.entity_id == entity_id)
            .collect()
    }

    /// Whether any matching callout blocks the entry's span.
    pub fn entry_blocked_by_callout(&self, entry: &ScheduleEntry) -> bool {
        let span = entry.span();
        let therapist_hit = self.callouts.iter().any(|c| {
            c.blocks(CalloutTarget::Therapist, &entry.therapist_id, self.date, &span)
        });
        if therapist_hit {
            return true;
        }
        match &entry.client_id {
            Some(client_id) => self
                .callouts
                .iter()
                .any(|c| c.blocks(CalloutTarget::Client, client_id, self.date, &span)),
            None => false,
        }
    }

    /// Whether a client and therapist share a team (both must have one).
    pub fn same_team(&self, client: &Client, therapist: &Therapist) -> bool {
        match (&client.team, &therapist.team) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Teammates of a therapist (same team, different id).
    pub fn teammates(&self, therapist: &Therapist) -> Vec<&Therapist> {
        match &therapist.team {
            None => Vec::new(),
            Some(team) => self
                .therapists
                .values()
                .filter(|t| t.id != therapist.id && t.team.as_deref() == Some(team))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::time::TimeRange;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn sample_context() -> EngineContext {
        let clients = vec![Client::new("c1").with_requirement("MD_MEDICAID")];
        let therapists = vec![
            Therapist::new("t1", Role::Rbt).with_qualification("MD_MEDICAID"),
            Therapist::new("t2", Role::Bcba),
            Therapist::new("t3", Role::Rbt)
                .with_qualification("MD_MEDICAID")
                .with_qualification("OT Certified")
                .with_allied_health(AhKind::Ot),
        ];
        let callouts = vec![
            Callout::new(
                "co1",
                CalloutTarget::Therapist,
                "t1",
                monday(),
                TimeRange::new(720, 750),
            ),
            // Different date: must be filtered out
            Callout::new(
                "co2",
                CalloutTarget::Therapist,
                "t1",
                monday().succ_opt().unwrap(),
                TimeRange::new(480, 1020),
            ),
        ];
        EngineContext::new(EngineConfig::default(), monday(), clients, therapists, callouts)
    }

    #[test]
    fn test_snapshot_filters_callouts_by_date() {
        let ctx = sample_context();
        assert_eq!(ctx.callouts.len(), 1);
        assert_eq!(ctx.callouts[0].id, "co1");
    }

    #[test]
    fn test_qualified_therapists() {
        let ctx = sample_context();
        let client = ctx.client("c1").unwrap();
        let qualified = ctx.qualified_therapists(client);
        // t2 lacks MD_MEDICAID
        assert_eq!(
            qualified.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec!["t1", "t3"]
        );

        let ot = ctx.ah_qualified_therapists(client, AhKind::Ot);
        assert_eq!(ot.len(), 1);
        assert_eq!(ot[0].id, "t3");
    }

    #[test]
    fn test_entry_blocked_by_callout() {
        let ctx = sample_context();
        let blocked = ScheduleEntry::new("e1", "c1", "t1", Weekday::Mon, 700, 760, crate::models::SessionKind::Aba);
        let clear = ScheduleEntry::new("e2", "c1", "t1", Weekday::Mon, 480, 540, crate::models::SessionKind::Aba);
        assert!(ctx.entry_blocked_by_callout(&blocked));
        assert!(!ctx.entry_blocked_by_callout(&clear));
    }

    #[test]
    fn test_weekend_detection() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let ctx = EngineContext::new(EngineConfig::default(), saturday, vec![], vec![], vec![]);
        assert!(ctx.is_weekend());
    }
}
