//! Team model.
//!
//! Teams group clients and therapists for soft affinity only; a schedule
//! stays valid across team boundaries.

use serde::{Deserialize, Serialize};

/// A clinic team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    /// Unique team identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Display color (e.g. `"#4f9d69"`).
    pub color: String,
}

impl Team {
    /// Creates a new team.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            color: String::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the display color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}
