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

// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
// SPDX-License-Identifier: AGPL-3.0
//! Replay Common - Shared functionality for the replay session client
//!
//! This crate provides the pieces every other component builds on: the total
//! order over execution points, the timestamped point and range types exchanged
//! with the backend, interval-set operations over those ranges, and the
//! logging setup used by binaries and tests.

/// Execution point parsing and ordering
pub mod point;

/// Timestamped points and ranges exchanged with the replay backend
pub mod types;

/// Interval-set operations over point and time ranges
pub mod intervals;

/// Logging setup and utilities for consistent logging across replay components
pub mod logging;

pub use point::*;
pub use types::*;
