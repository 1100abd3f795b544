//! Base-schedule presets.
//!
//! A base schedule is a reusable per-weekday preset the clinic maintains
//! by hand. The engine grafts its non-conflicting entries into seed
//! individuals; it never edits the preset itself.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::entry::ScheduleEntry;

/// A named per-weekday schedule preset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSchedule {
    /// Unique preset identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Weekdays the preset applies to.
    pub weekdays: Vec<Weekday>,
    /// Preset entries (their `weekday` fields select within `weekdays`).
    pub entries: Vec<ScheduleEntry>,
}

impl BaseSchedule {
    /// Creates an empty preset.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weekdays: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// Adds an applicable weekday.
    pub fn with_weekday(mut self, weekday: Weekday) -> Self {
        self.weekdays.push(weekday);
        self
    }

    /// Adds a preset entry.
    pub fn with_entry(mut self, entry: ScheduleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Whether the preset applies to a weekday.
    pub fn applies_to(&self, weekday: Weekday) -> bool {
        self.weekdays.contains(&weekday)
    }

    /// Preset entries for one weekday.
    pub fn entries_for(&self, weekday: Weekday) -> Vec<&ScheduleEntry> {
        if !self.applies_to(weekday) {
            return Vec::new();
        }
        self.entries.iter().filter(|e| e.weekday == weekday).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::entry::SessionKind;

    #[test]
    fn test_entries_for_weekday() {
        let preset = BaseSchedule::new("b1", "Standard week")
            .with_weekday(Weekday::Mon)
            .with_entry(ScheduleEntry::new(
                "p1", "c1", "t1", Weekday::Mon, 480, 600, SessionKind::Aba,
            ))
            .with_entry(ScheduleEntry::new(
                "p2", "c1", "t1", Weekday::Tue, 480, 600, SessionKind::Aba,
            ));

        assert!(preset.applies_to(Weekday::Mon));
        assert!(!preset.applies_to(Weekday::Tue));
        assert_eq!(preset.entries_for(Weekday::Mon).len(), 1);
        // Tue entry exists but the preset does not apply on Tue
        assert!(preset.entries_for(Weekday::Tue).is_empty());
    }
}
