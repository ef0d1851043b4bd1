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

//! Opaque backend identifiers.
//!
//! None of these identifiers are orderable; they support equality and hashing
//! only. Object, frame and scope ids are meaningful solely in combination with
//! the [`PauseId`] that owns them.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(
    /// Identifier of one debugging session on the backend.
    SessionId
);

opaque_id!(
    /// Identifier of one recording.
    RecordingId
);

opaque_id!(
    /// Names one paused-execution snapshot.
    ///
    /// Pausing twice at the same point may yield two different ids, so a
    /// `PauseId` must never be derived from a point on the client side.
    PauseId
);

opaque_id!(
    /// Identifies an object within a single pause.
    ObjectId
);

opaque_id!(
    /// Identifies a stack frame within a single pause.
    FrameId
);

opaque_id!(
    /// Identifies a scope within a single pause.
    ScopeId
);

opaque_id!(
    /// Identifies a loaded script or file.
    SourceId
);

opaque_id!(
    /// Identifies a network request captured in the recording.
    RequestId
);
