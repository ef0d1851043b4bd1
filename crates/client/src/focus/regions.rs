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

//! Loaded and indexed regions of the recording.

use replay_common::{
    intervals::{compute_non_loading_time_ranges, is_point_in_ranges, is_range_in_ranges, normalize_point_ranges, total_duration},
    ExecutionPoint, TimeRange, TimeStampedPointRange,
};
use serde::{Deserialize, Serialize};

/// Backend preparation state of the recording.
///
/// - `loading`: ranges the backend has been asked to prepare
/// - `loaded`: ranges whose replay processes are running
/// - `indexed`: ranges that can be queried
///
/// Always held in normalized form: sorted by point and non-overlapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedRegions {
    /// Ranges the backend has been asked to prepare
    #[serde(default)]
    pub loading: Vec<TimeStampedPointRange>,
    /// Ranges whose replay processes are running
    #[serde(default)]
    pub loaded: Vec<TimeStampedPointRange>,
    /// Ranges that have been indexed and can be queried
    #[serde(default)]
    pub indexed: Vec<TimeStampedPointRange>,
}

impl LoadedRegions {
    /// Normalize raw backend data.
    pub fn from_raw(
        loading: Vec<TimeStampedPointRange>,
        loaded: Vec<TimeStampedPointRange>,
        indexed: Vec<TimeStampedPointRange>,
    ) -> Self {
        Self {
            loading: normalize_point_ranges(loading),
            loaded: normalize_point_ranges(loaded),
            indexed: normalize_point_ranges(indexed),
        }
    }

    /// Re-establish the normalized form after deserialization.
    pub fn normalized(self) -> Self {
        Self::from_raw(self.loading, self.loaded, self.indexed)
    }

    /// Returns `true` if `point` can be queried.
    pub fn is_point_indexed(&self, point: &ExecutionPoint) -> bool {
        is_point_in_ranges(point, &self.indexed)
    }

    /// Returns `true` if `point` is loaded, indexed or not.
    pub fn is_point_loaded(&self, point: &ExecutionPoint) -> bool {
        is_point_in_ranges(point, &self.loaded)
    }

    /// Returns `true` if the whole range can be queried.
    pub fn is_range_indexed(&self, range: &TimeStampedPointRange) -> bool {
        is_range_in_ranges(range, &self.indexed)
    }

    /// Returns `true` if the whole range is loaded.
    pub fn is_range_loaded(&self, range: &TimeStampedPointRange) -> bool {
        is_range_in_ranges(range, &self.loaded)
    }

    /// Share of the requested (loading) time that has been indexed, in `[0, 1]`.
    pub fn indexing_progress(&self) -> f64 {
        let requested = total_duration(&self.loading);
        if requested <= 0.0 {
            return if self.indexed.is_empty() { 0.0 } else { 1.0 };
        }
        (total_duration(&self.indexed) / requested).clamp(0.0, 1.0)
    }

    /// Parts of `[0, end_time]` that are not being loaded.
    pub fn non_loading_time_ranges(&self, end_time: f64) -> Vec<TimeRange> {
        let loading: Vec<_> = self.loading.iter().map(TimeStampedPointRange::time_range).collect();
        compute_non_loading_time_ranges(&loading, end_time)
    }
}
