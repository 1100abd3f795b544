//! Clock-time primitives for the roster grid.
//!
//! All scheduling times are minutes since midnight, kept on a 15-minute
//! grid. `TimeRange` is the half-open interval used everywhere an entry,
//! callout window, or coverage gap needs a span.
//!
//! # Time Model
//! Minutes are `i32` and always non-negative in valid data; conversions
//! to and from `"HH:MM"` are bijective on the grid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes since midnight.
pub type Minutes = i32;

/// Width of one scheduling slot in minutes.
pub const SLOT_MINUTES: Minutes = 15;

/// Error parsing an `"HH:MM"` clock string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// The string is not of the form `HH:MM`.
    #[error("malformed clock time '{0}', expected HH:MM")]
    Malformed(String),
    /// Hours or minutes are out of range.
    #[error("clock time '{0}' out of range")]
    OutOfRange(String),
}

/// Parses an `"HH:MM"` string into minutes since midnight.
pub fn parse_hhmm(s: &str) -> Result<Minutes, TimeParseError> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| TimeParseError::Malformed(s.to_string()))?;
    let hours: i32 = h
        .parse()
        .map_err(|_| TimeParseError::Malformed(s.to_string()))?;
    let minutes: i32 = m
        .parse()
        .map_err(|_| TimeParseError::Malformed(s.to_string()))?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(TimeParseError::OutOfRange(s.to_string()));
    }
    Ok(hours * 60 + minutes)
}

/// Formats minutes since midnight as `"HH:MM"`.
pub fn format_hhmm(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes.div_euclid(60), minutes.rem_euclid(60))
}

/// Whether a minute value lies on the 15-minute grid.
#[inline]
pub fn on_grid(minutes: Minutes) -> bool {
    minutes % SLOT_MINUTES == 0
}

/// Rounds down to the grid.
#[inline]
pub fn align_down(minutes: Minutes) -> Minutes {
    minutes - minutes.rem_euclid(SLOT_MINUTES)
}

/// Rounds up to the grid.
#[inline]
pub fn align_up(minutes: Minutes) -> Minutes {
    let rem = minutes.rem_euclid(SLOT_MINUTES);
    if rem == 0 {
        minutes
    } else {
        minutes + (SLOT_MINUTES - rem)
    }
}

/// A half-open minute interval [start, end).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    /// Interval start (minutes, inclusive).
    pub start: Minutes,
    /// Interval end (minutes, exclusive).
    pub end: Minutes,
}

impl TimeRange {
    /// Creates a new range.
    pub fn new(start: Minutes, end: Minutes) -> Self {
        Self { start, end }
    }

    /// Duration in minutes.
    #[inline]
    pub fn duration(&self) -> Minutes {
        self.end - self.start
    }

    /// Whether a minute falls within this range.
    #[inline]
    pub fn contains(&self, minutes: Minutes) -> bool {
        minutes >= self.start && minutes < self.end
    }

    /// Whether two ranges overlap.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Overlap duration with another range (0 if disjoint).
    pub fn overlap_minutes(&self, other: &Self) -> Minutes {
        (self.end.min(other.end) - self.start.max(other.start)).max(0)
    }

    /// Subtracts `other` from this range, yielding 0..=2 residual pieces.
    pub fn subtract(&self, other: &Self) -> Vec<TimeRange> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut out = Vec::new();
        if other.start > self.start {
            out.push(TimeRange::new(self.start, other.start));
        }
        if other.end < self.end {
            out.push(TimeRange::new(other.end, self.end));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format_roundtrip() {
        for s in ["00:00", "08:00", "11:30", "13:15", "17:00", "23:45"] {
            let m = parse_hhmm(s).unwrap();
            assert_eq!(format_hhmm(m), s);
        }
        assert_eq!(parse_hhmm("08:00"), Ok(480));
        assert_eq!(parse_hhmm("17:00"), Ok(1020));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(parse_hhmm("800"), Err(TimeParseError::Malformed(_))));
        assert!(matches!(parse_hhmm("ab:cd"), Err(TimeParseError::Malformed(_))));
        assert!(matches!(parse_hhmm("25:00"), Err(TimeParseError::OutOfRange(_))));
        assert!(matches!(parse_hhmm("10:75"), Err(TimeParseError::OutOfRange(_))));
    }

    #[test]
    fn test_grid_alignment() {
        assert!(on_grid(480));
        assert!(!on_grid(487));
        assert_eq!(align_down(487), 480);
        assert_eq!(align_up(487), 495);
        assert_eq!(align_up(495), 495);
    }

    #[test]
    fn test_range_basics() {
        let r = TimeRange::new(480, 540);
        assert_eq!(r.duration(), 60);
        assert!(r.contains(480));
        assert!(r.contains(539));
        assert!(!r.contains(540)); // exclusive end
    }

    #[test]
    fn test_range_overlap() {
        let a = TimeRange::new(480, 540);
        let b = TimeRange::new(530, 600);
        assert!(a.overlaps(&b));
        assert_eq!(a.overlap_minutes(&b), 10);

        let c = TimeRange::new(540, 600); // touching, not overlapping
        assert!(!a.overlaps(&c));
        assert_eq!(a.overlap_minutes(&c), 0);
    }

    #[test]
    fn test_range_subtract() {
        let day = TimeRange::new(480, 1020);
        // Hole in the middle → two pieces
        let pieces = day.subtract(&TimeRange::new(720, 750));
        assert_eq!(pieces, vec![TimeRange::new(480, 720), TimeRange::new(750, 1020)]);
        // Covering subtraction → nothing
        assert!(day.subtract(&TimeRange::new(0, 1440)).is_empty());
        // Disjoint → unchanged
        assert_eq!(day.subtract(&TimeRange::new(0, 400)), vec![day]);
        // Left-aligned hole → one right piece
        assert_eq!(
            day.subtract(&TimeRange::new(480, 600)),
            vec![TimeRange::new(600, 1020)]
        );
    }
}
