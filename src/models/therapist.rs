//! Therapist model.
//!
//! Therapists carry a coarse seniority role, a set of qualification tags
//! (credentials, insurance markers, allied-health certificates), and the
//! allied-health disciplines they may deliver.

use serde::{Deserialize, Serialize};

use super::client::AhKind;

/// Coarse seniority role, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Board Certified Behavior Analyst.
    Bcba,
    /// Certification fellow.
    Cf,
    Star3,
    Star2,
    Star1,
    /// Registered Behavior Technician.
    Rbt,
    /// Behavior Technician.
    Bt,
    Other,
}

impl Role {
    /// Seniority rank; higher means more senior.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Bcba => 7,
            Role::Cf => 6,
            Role::Star3 => 5,
            Role::Star2 => 4,
            Role::Star1 => 3,
            Role::Rbt => 2,
            Role::Bt => 1,
            Role::Other => 0,
        }
    }
}

/// A therapist in the day's pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Therapist {
    /// Unique therapist identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Team identifier, if the therapist belongs to one.
    pub team: Option<String>,
    /// Seniority role.
    pub role: Role,
    /// Qualification tags (credentials, insurance markers, certificates).
    pub qualifications: Vec<String>,
    /// Allied-health disciplines the therapist may deliver.
    pub allied_health: Vec<AhKind>,
}

impl Therapist {
    /// Creates a new therapist with the given role.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            team: None,
            role,
            qualifications: Vec::new(),
            allied_health: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the team.
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Adds a qualification tag.
    pub fn with_qualification(mut self, tag: impl Into<String>) -> Self {
        self.qualifications.push(tag.into());
        self
    }

    /// Enables an allied-health discipline.
    pub fn with_allied_health(mut self, kind: AhKind) -> Self {
        self.allied_health.push(kind);
        self
    }

    /// Whether the therapist carries a qualification tag.
    pub fn has_qualification(&self, tag: &str) -> bool {
        self.qualifications.iter().any(|q| q == tag)
    }

    /// Whether the therapist satisfies every tag in `requirements`.
    pub fn satisfies(&self, requirements: &[String]) -> bool {
        requirements.iter().all(|r| self.has_qualification(r))
    }

    /// Whether the therapist may deliver the given allied-health kind.
    ///
    /// Requires both the discipline capability and its certificate tag.
    pub fn can_deliver(&self, kind: AhKind) -> bool {
        self.allied_health.contains(&kind) && self.has_qualification(kind.certificate())
    }
}
