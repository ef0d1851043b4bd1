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

//! Execution points and their total order.
//!
//! An execution point names a unique moment in a recorded execution. The
//! backend encodes points as arbitrary-precision non-negative integers in
//! decimal form, so they routinely exceed the range of fixed-width integers
//! and cannot be compared lexically either (`"9" > "10"` as strings).
//!
//! All comparisons in this module are numeric: leading zeros are ignored, a
//! longer digit string is larger, and equal-length strings compare digit by
//! digit.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when a string is not a valid execution point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointParseError {
    /// The input was empty
    #[error("execution point is empty")]
    Empty,
    /// The input contained a non-digit character
    #[error("execution point {point:?} contains non-digit character {found:?}")]
    InvalidDigit {
        /// The rejected input
        point: String,
        /// The first offending character
        found: char,
    },
}

/// Returns `true` if `point` is a non-empty string of ASCII decimal digits.
pub fn is_valid_point(point: &str) -> bool {
    !point.is_empty() && point.bytes().all(|b| b.is_ascii_digit())
}

fn significant_digits(point: &str) -> &str {
    point.trim_start_matches('0')
}

/// Compare two execution points by integer value.
///
/// Both inputs must consist only of decimal digits. Malformed input is a
/// programmer error and trips a debug assertion.
pub fn compare_execution_points(a: &str, b: &str) -> Ordering {
    debug_assert!(is_valid_point(a), "malformed execution point: {a:?}");
    debug_assert!(is_valid_point(b), "malformed execution point: {b:?}");

    let a = significant_digits(a);
    let b = significant_digits(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Numeric equality of two execution points.
pub fn point_equals(a: &str, b: &str) -> bool {
    compare_execution_points(a, b) == Ordering::Equal
}

/// Returns `true` if `a` comes strictly before `b`.
pub fn point_precedes(a: &str, b: &str) -> bool {
    compare_execution_points(a, b) == Ordering::Less
}

/// A unique, totally ordered moment in a recorded execution.
///
/// The original string is preserved for round-tripping on the wire, while
/// equality, ordering and hashing all go through the numeric value.
#[derive(Clone)]
pub struct ExecutionPoint(String);

impl ExecutionPoint {
    /// Parse an execution point, rejecting anything that is not a digit string.
    pub fn new(point: impl Into<String>) -> Result<Self, PointParseError> {
        let point = point.into();
        if point.is_empty() {
            return Err(PointParseError::Empty);
        }
        if let Some(found) = point.chars().find(|c| !c.is_ascii_digit()) {
            return Err(PointParseError::InvalidDigit { point, found });
        }
        Ok(Self(point))
    }

    /// The point at the very beginning of every recording.
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    /// The decimal representation as received from the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this point comes strictly before `other`.
    pub fn precedes(&self, other: &Self) -> bool {
        self < other
    }
}

impl PartialEq for ExecutionPoint {
    fn eq(&self, other: &Self) -> bool {
        point_equals(&self.0, &other.0)
    }
}

impl Eq for ExecutionPoint {}

impl PartialOrd for ExecutionPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ExecutionPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_execution_points(&self.0, &other.0)
    }
}

impl Hash for ExecutionPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with numeric equality: "007" and "7" hash alike.
        significant_digits(&self.0).hash(state);
    }
}

impl fmt::Debug for ExecutionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExecutionPoint({})", self.0)
    }
}

impl fmt::Display for ExecutionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ExecutionPoint {
    type Err = PointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for ExecutionPoint {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ExecutionPoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ExecutionPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ExecutionPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
