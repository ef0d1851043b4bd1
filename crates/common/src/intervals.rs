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

//! Interval-set operations over point and time ranges.
//!
//! Sets are represented as `Vec`s of ranges sorted by start and pairwise
//! non-overlapping. The `normalize_*` functions establish that form; every
//! query function assumes it.

use std::cmp::Ordering;

use crate::{ExecutionPoint, TimeRange, TimeStampedPointRange};

/// Sort ranges by begin point and merge the ones that overlap or touch.
///
/// ```
/// use replay_common::{intervals::normalize_point_ranges, TimeStampedPoint, TimeStampedPointRange};
///
/// let range = |b: u64, e: u64| {
///     TimeStampedPointRange::new(TimeStampedPoint::new(b.into(), b as f64), TimeStampedPoint::new(e.into(), e as f64))
/// };
/// let merged = normalize_point_ranges(vec![range(40, 90), range(10, 50)]);
/// assert_eq!(merged, vec![range(10, 90)]);
/// ```
pub fn normalize_point_ranges(mut ranges: Vec<TimeStampedPointRange>) -> Vec<TimeStampedPointRange> {
    ranges.sort_by(|a, b| a.begin.point.cmp(&b.begin.point));

    let mut merged: Vec<TimeStampedPointRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.begin.point <= last.end.point => {
                if range.end.point > last.end.point {
                    last.end = range.end;
                }
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Returns `true` if `point` lies in one of the normalized `ranges`.
pub fn is_point_in_ranges(point: &ExecutionPoint, ranges: &[TimeStampedPointRange]) -> bool {
    ranges
        .binary_search_by(|range| {
            if range.end.point < *point {
                Ordering::Less
            } else if range.begin.point > *point {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

/// Returns `true` if `range` lies entirely inside one of the normalized
/// `ranges`.
pub fn is_range_in_ranges(range: &TimeStampedPointRange, ranges: &[TimeStampedPointRange]) -> bool {
    // After normalization a contained range can only sit inside the range
    // holding its begin point.
    let index = ranges.partition_point(|candidate| candidate.end.point < range.begin.point);
    ranges.get(index).is_some_and(|candidate| candidate.contains_range(range))
}

/// Sort time ranges and merge the ones that overlap or touch.
pub fn normalize_time_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    ranges.retain(|range| range.begin <= range.end);
    ranges.sort_by(|a, b| a.begin.total_cmp(&b.begin));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.begin <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

/// Time ranges in `[0, end_time]` not covered by any loading range.
///
/// Used to grey out the parts of a timeline that are not being loaded.
pub fn compute_non_loading_time_ranges(loading: &[TimeRange], end_time: f64) -> Vec<TimeRange> {
    let mut result = Vec::new();
    let mut cursor = 0.0_f64;

    for range in normalize_time_ranges(loading.to_vec()) {
        if range.begin >= end_time {
            break;
        }
        if range.begin > cursor {
            result.push(TimeRange::new(cursor, range.begin));
        }
        cursor = cursor.max(range.end);
    }

    if cursor < end_time {
        result.push(TimeRange::new(cursor, end_time));
    }
    result
}

/// Total duration of a set of ranges in milliseconds.
pub fn total_duration(ranges: &[TimeStampedPointRange]) -> f64 {
    ranges.iter().map(TimeStampedPointRange::duration).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TimeStampedPoint;

    fn range(begin: u64, end: u64) -> TimeStampedPointRange {
        TimeStampedPointRange::new(
            TimeStampedPoint::new(begin.into(), begin as f64),
            TimeStampedPoint::new(end.into(), end as f64),
        )
    }

    #[test]
    fn test_overlapping_ranges_coalesce() {
        assert_eq!(normalize_point_ranges(vec![range(10, 50), range(40, 90)]), vec![range(10, 90)]);
    }

    #[test]
    fn test_normalize_sorts_and_keeps_disjoint_ranges() {
        let merged = normalize_point_ranges(vec![range(60, 70), range(0, 5), range(3, 8), range(65, 66)]);
        assert_eq!(merged, vec![range(0, 8), range(60, 70)]);
        assert!(normalize_point_ranges(vec![]).is_empty());
    }

    #[test]
    fn test_normalize_uses_numeric_point_order() {
        // "9" sorts after "10" lexically but not numerically.
        let merged = normalize_point_ranges(vec![range(100, 200), range(9, 10)]);
        assert_eq!(merged, vec![range(9, 10), range(100, 200)]);
    }

    #[test]
    fn test_point_and_range_queries() {
        let ranges = normalize_point_ranges(vec![range(10, 50), range(40, 90), range(200, 300)]);

        assert!(is_point_in_ranges(&10u64.into(), &ranges));
        assert!(is_point_in_ranges(&90u64.into(), &ranges));
        assert!(!is_point_in_ranges(&91u64.into(), &ranges));
        assert!(is_point_in_ranges(&250u64.into(), &ranges));
        assert!(!is_point_in_ranges(&5u64.into(), &ranges));

        assert!(is_range_in_ranges(&range(20, 80), &ranges));
        assert!(is_range_in_ranges(&range(200, 300), &ranges));
        assert!(!is_range_in_ranges(&range(80, 210), &ranges));
        assert!(!is_range_in_ranges(&range(95, 100), &ranges));
        assert!(!is_range_in_ranges(&range(20, 80), &[]));
    }

    #[test]
    fn test_non_loading_time_ranges() {
        let loading = [TimeRange::new(100.0, 200.0), TimeRange::new(300.0, 400.0)];
        assert_eq!(
            compute_non_loading_time_ranges(&loading, 500.0),
            vec![TimeRange::new(0.0, 100.0), TimeRange::new(200.0, 300.0), TimeRange::new(400.0, 500.0)]
        );
    }

    #[test]
    fn test_non_loading_time_ranges_edges() {
        assert_eq!(compute_non_loading_time_ranges(&[], 50.0), vec![TimeRange::new(0.0, 50.0)]);
        assert!(compute_non_loading_time_ranges(&[TimeRange::new(0.0, 50.0)], 50.0).is_empty());
        // Unsorted, overlapping input and ranges past the end.
        let loading = [TimeRange::new(30.0, 40.0), TimeRange::new(0.0, 10.0), TimeRange::new(5.0, 20.0), TimeRange::new(60.0, 90.0)];
        assert_eq!(
            compute_non_loading_time_ranges(&loading, 50.0),
            vec![TimeRange::new(20.0, 30.0), TimeRange::new(40.0, 50.0)]
        );
    }

    #[test]
    fn test_total_duration() {
        assert_eq!(total_duration(&[range(0, 10), range(20, 25)]), 15.0);
    }
}
