//! Read-snapshot contract for the persistence collaborator.
//!
//! The engine never talks to a live store: the host takes one snapshot
//! of the keyed collections at invocation time and converts it into a
//! `RosterRequest`. Bulk CRUD, subscriptions, and realtime notifications
//! belong to the store itself and are out of scope here.
//!
//! Collections are optional so a partial read is distinguishable from an
//! empty one; a missing required collection is the `MISSING_DATA` error.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::RosterRequest;
use crate::models::{BaseSchedule, Callout, Client, Team, Therapist, Violation, ViolationRule};

/// Settings key carrying the clinic's known insurance qualification tags.
pub const INSURANCE_QUALIFICATIONS_KEY: &str = "insurance_qualifications";

/// One point-in-time read of the store's collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Clients collection; `None` when the read failed.
    pub clients: Option<Vec<Client>>,
    /// Therapists collection; `None` when the read failed.
    pub therapists: Option<Vec<Therapist>>,
    /// Teams collection.
    pub teams: Option<Vec<Team>>,
    /// Callouts collection.
    pub callouts: Option<Vec<Callout>>,
    /// Base-schedule presets.
    pub base_schedules: Option<Vec<BaseSchedule>>,
    /// Opaque settings payloads keyed by name.
    pub settings: HashMap<String, Value>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Known insurance qualification tags from settings, if present.
    pub fn insurance_qualifications(&self) -> Vec<String> {
        self.settings
            .get(INSURANCE_QUALIFICATIONS_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Converts the snapshot into a run request for one date.
    ///
    /// Clients and therapists are required collections; a snapshot read
    /// that missed either yields the single `MISSING_DATA` violation.
    /// The first base schedule applying to the date's weekday is used.
    pub fn into_request(self, date: NaiveDate) -> Result<RosterRequest, Vec<Violation>> {
        let (clients, therapists) = match (self.clients, self.therapists) {
            (Some(clients), Some(therapists)) => (clients, therapists),
            (clients, therapists) => {
                let mut missing = Vec::new();
                if clients.is_none() {
                    missing.push("clients");
                }
                if therapists.is_none() {
                    missing.push("therapists");
                }
                return Err(vec![Violation::new(
                    ViolationRule::MissingData,
                    "snapshot",
                    format!("snapshot is missing: {}", missing.join(", ")),
                )]);
            }
        };

        let weekday = chrono::Datelike::weekday(&date);
        let base_schedule = self
            .base_schedules
            .unwrap_or_default()
            .into_iter()
            .find(|b| b.applies_to(weekday));

        let mut request = RosterRequest::new(clients, therapists, date)
            .with_callouts(self.callouts.unwrap_or_default());
        request.base_schedule = base_schedule;
        Ok(request)
    }
}
