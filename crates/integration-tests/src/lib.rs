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
//! Replay Integration Tests - end-to-end harness for the session client
//!
//! Provides a mock dispatch server speaking the replay wire protocol over a
//! real WebSocket, plus fixtures and helpers shared by the tests under
//! `tests/`.

/// Scripted WebSocket dispatch server
pub mod mock_server;

/// Fixtures and helpers for integration tests
pub mod test_utils;

pub use mock_server::{MockDispatchServer, MockReply, MockRequest, MockServerHandle};
