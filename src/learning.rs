//! Learning-service contract.
//!
//! The engine treats the learning service as an oracle: at most K prior
//! schedules per weekday for seeding, a table of preferred lunch windows,
//! and a feedback sink. A host without a learning backend plugs in
//! [`NoLearning`]; [`InMemoryLearning`] is a complete reference
//! implementation that mines its own ratings.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Weekday;

use crate::models::{DaySchedule, Violation};
use crate::time::TimeRange;

/// Oracle interface to the (optional) learning collaborator.
pub trait LearningService {
    /// Up to `k` highest-rated prior schedules for a weekday, best first.
    fn top_schedules(&self, weekday: Weekday, k: usize) -> Vec<DaySchedule>;

    /// Preferred lunch window per therapist id.
    fn lunch_preferences(&self) -> HashMap<String, TimeRange>;

    /// Records a user rating of a produced schedule.
    fn record_feedback(&self, schedule: &DaySchedule, rating: f64, violations: &[Violation]);
}

/// Learning service that knows nothing and remembers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLearning;

impl LearningService for NoLearning {
    fn top_schedules(&self, _weekday: Weekday, _k: usize) -> Vec<DaySchedule> {
        Vec::new()
    }

    fn lunch_preferences(&self) -> HashMap<String, TimeRange> {
        HashMap::new()
    }

    fn record_feedback(&self, _schedule: &DaySchedule, _rating: f64, _violations: &[Violation]) {}
}

/// Rating threshold above which a schedule informs lunch preferences.
const HIGH_RATING: f64 = 4.0;

#[derive(Debug)]
struct RatedSchedule {
    schedule: DaySchedule,
    rating: f64,
}

/// In-process learning service backed by its own feedback history.
#[derive(Debug, Default)]
pub struct InMemoryLearning {
    history: Mutex<HashMap<Weekday, Vec<RatedSchedule>>>,
}

impl InMemoryLearning {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LearningService for InMemoryLearning {
    fn top_schedules(&self, weekday: Weekday, k: usize) -> Vec<DaySchedule> {
        let history = self.history.lock().expect("learning history lock");
        let Some(rated) = history.get(&weekday) else {
            return Vec::new();
        };
        let mut sorted: Vec<&RatedSchedule> = rated.iter().collect();
        sorted.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        sorted.into_iter().take(k).map(|r| r.schedule.clone()).collect()
    }

    fn lunch_preferences(&self) -> HashMap<String, TimeRange> {
        // The most recent highly rated lunch slot per therapist wins.
        let history = self.history.lock().expect("learning history lock");
        let mut prefs = HashMap::new();
        for rated in history.values().flatten() {
            if rated.rating < HIGH_RATING {
                continue;
            }
            for entry in &rated.schedule.entries {
                if entry.is_lunch() {
                    prefs.insert(
                        entry.therapist_id.clone(),
                        TimeRange::new(entry.start, entry.end),
                    );
                }
            }
        }
        prefs
    }

    fn record_feedback(&self, schedule: &DaySchedule, rating: f64, _violations: &[Violation]) {
        let mut history = self.history.lock().expect("learning history lock");
        history
            .entry(schedule.weekday())
            .or_default()
            .push(RatedSchedule {
                schedule: schedule.clone(),
                rating,
            });
    }
}
