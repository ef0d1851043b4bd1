// Replay - time-travel debugging session client
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Timestamped points and the ranges built from them.

use serde::{Deserialize, Serialize};

use crate::ExecutionPoint;

/// An execution point together with its time since the recording started.
///
/// `point` is authoritative for ordering. `time` is advisory and is not
/// guaranteed to be consistent with point order across sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeStampedPoint {
    /// The execution point
    pub point: ExecutionPoint,
    /// Milliseconds since recording start
    #[serde(with = "time_ms")]
    pub time: TimeMs,
}

impl TimeStampedPoint {
    /// Create a new timestamped point.
    pub fn new(point: ExecutionPoint, time: f64) -> Self {
        Self { point, time: TimeMs(time) }
    }

    /// The advisory time in milliseconds.
    pub fn time(&self) -> f64 {
        self.time.0
    }
}

/// Milliseconds since recording start.
///
/// Wrapped so that [`TimeStampedPoint`] can be hashed and compared for
/// equality; NaN never comes from the backend.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TimeMs(pub f64);

impl Eq for TimeMs {}

impl std::hash::Hash for TimeMs {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // -0.0 == 0.0, so both must hash alike.
        let time = if self.0 == 0.0 { 0.0 } else { self.0 };
        time.to_bits().hash(state);
    }
}

mod time_ms {
    use super::TimeMs;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(time: &TimeMs, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(time.0)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeMs, D::Error> {
        f64::deserialize(deserializer).map(TimeMs)
    }
}

/// A closed range of the recording, `begin <= end` by point order.
///
/// Used both for the full recording bounds and for user-narrowed focus
/// windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeStampedPointRange {
    /// First point of the range
    pub begin: TimeStampedPoint,
    /// Last point of the range
    pub end: TimeStampedPoint,
}

impl TimeStampedPointRange {
    /// Create a range, swapping the endpoints if they arrive out of order.
    pub fn new(begin: TimeStampedPoint, end: TimeStampedPoint) -> Self {
        if end.point < begin.point {
            Self { begin: end, end: begin }
        } else {
            Self { begin, end }
        }
    }

    /// Returns `true` if `point` lies within the range (inclusive).
    pub fn contains_point(&self, point: &ExecutionPoint) -> bool {
        self.begin.point <= *point && *point <= self.end.point
    }

    /// Returns `true` if `other` lies entirely within this range.
    pub fn contains_range(&self, other: &Self) -> bool {
        self.begin.point <= other.begin.point && other.end.point <= self.end.point
    }

    /// Returns `true` if the two ranges share at least one point.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.begin.point <= other.end.point && other.begin.point <= self.end.point
    }

    /// Advisory duration in milliseconds.
    pub fn duration(&self) -> f64 {
        (self.end.time() - self.begin.time()).max(0.0)
    }

    /// The time-only projection of this range.
    pub fn time_range(&self) -> TimeRange {
        TimeRange { begin: self.begin.time(), end: self.end.time() }
    }
}

/// A range of recording time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub begin: f64,
    /// End time (inclusive)
    pub end: f64,
}

impl TimeRange {
    /// Create a new time range.
    pub fn new(begin: f64, end: f64) -> Self {
        Self { begin, end }
    }

    /// Length of the range in milliseconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.begin).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tsp(point: u64, time: f64) -> TimeStampedPoint {
        TimeStampedPoint::new(point.into(), time)
    }

    #[test]
    fn test_range_new_orders_endpoints() {
        let range = TimeStampedPointRange::new(tsp(90, 9.0), tsp(10, 1.0));
        assert_eq!(range.begin.point, ExecutionPoint::from(10));
        assert_eq!(range.end.point, ExecutionPoint::from(90));
    }

    #[test]
    fn test_range_containment_and_overlap() {
        let outer = TimeStampedPointRange::new(tsp(10, 1.0), tsp(90, 9.0));
        let inner = TimeStampedPointRange::new(tsp(20, 2.0), tsp(50, 5.0));
        let disjoint = TimeStampedPointRange::new(tsp(91, 9.1), tsp(100, 10.0));

        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(outer.overlaps(&inner));
        assert!(!outer.overlaps(&disjoint));
        assert!(outer.contains_point(&ExecutionPoint::from(90)));
        assert!(!outer.contains_point(&ExecutionPoint::from(91)));
    }

    #[test]
    fn test_signed_zero_times_hash_alike() {
        use std::collections::HashSet;

        assert_eq!(TimeMs(0.0), TimeMs(-0.0));
        let points: HashSet<_> = [tsp(5, 0.0), tsp(5, -0.0)].into_iter().collect();
        assert_eq!(points.len(), 1);

        let times: HashSet<_> = [TimeMs(-0.0), TimeMs(0.0), TimeMs(1.5)].into_iter().collect();
        assert_eq!(times.len(), 2);
    }

    #[test]
    fn test_timestamped_point_wire_format() {
        let json = r#"{"point":"123456789012345678901234567890","time":1500.5}"#;
        let parsed: TimeStampedPoint = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.point.as_str(), "123456789012345678901234567890");
        assert_eq!(parsed.time(), 1500.5);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), json);
    }
}
