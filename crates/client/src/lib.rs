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
//! Replay Client - session, caching and data model for time-travel debugging
//!
//! This crate talks to a replay backend over a single persistent connection
//! and exposes the recorded execution through [`ReplayClient`]:
//!
//! - [`transport`]: command/response correlation and event fan-out
//! - [`cache`]: keyed, single-entry, streaming and externally managed caches
//!   with at most one in-flight load per key
//! - [`pause`]: per-pause tables of frames, scopes and objects
//! - [`focus`]: loaded regions and the focus window
//! - [`ReplayClient`]: the facade composing all of the above

pub mod cache;
mod client;
pub mod config;
pub mod error;
pub mod focus;
pub mod pause;
pub mod transport;

pub use client::*;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
