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

//! Test utilities for integration tests

/// Initialization utilities for tests
pub mod init {
    /// Initialize logging for a test
    pub fn init_test_environment() {
        replay_common::logging::ensure_test_logging(None);
    }
}

/// Canned backend payloads
pub mod fixtures {
    use serde_json::{json, Value};

    /// Recording used by every end-to-end test
    pub const RECORDING_ID: &str = "9f1c2a7e-recording";

    /// A `{begin, end}` range whose point and time are both the given values.
    pub fn range(begin: u64, end: u64) -> Value {
        json!({
            "begin": { "point": begin.to_string(), "time": begin as f64 },
            "end": { "point": end.to_string(), "time": end as f64 },
        })
    }

    /// Loaded regions with everything up to `loaded` loaded and everything
    /// up to `indexed` indexed, out of a recording of `total` ms.
    pub fn loaded_regions(total: u64, loaded: u64, indexed: u64) -> Value {
        json!({
            "loading": [range(0, total)],
            "loaded": [range(0, loaded)],
            "indexed": [range(0, indexed)],
        })
    }

    /// A generated script and its original source.
    pub fn sources() -> Value {
        json!([
            { "sourceId": "gen-1", "kind": "scriptSource", "url": "https://app.test/bundle.js" },
            {
                "sourceId": "orig-1",
                "kind": "sourceMapped",
                "url": "webpack:///src/app.ts",
                "generatedSourceIds": ["gen-1"],
            },
        ])
    }

    /// Paused-state data for a small DOM: `document > body > div`.
    pub fn dom_pause_data() -> Value {
        fn node(id: &str, name: &str, parent: Option<&str>, children: &[&str]) -> Value {
            json!({
                "objectId": id,
                "className": "HTMLElement",
                "preview": {
                    "node": {
                        "nodeType": 1,
                        "nodeName": name,
                        "parentNode": parent,
                        "childNodes": children,
                        "isConnected": true,
                    },
                },
            })
        }

        json!({
            "objects": [
                node("doc", "#document", None, &["body"]),
                node("body", "BODY", Some("doc"), &["div"]),
                node("div", "DIV", Some("body"), &[]),
            ],
        })
    }
}

/// Client setup against a mock dispatch server
pub mod client {
    use eyre::Result;
    use replay_client::{ClientConfig, ReplayClient};
    use replay_common::RecordingId;
    use tracing::info;

    use super::fixtures::RECORDING_ID;

    /// Connect to `url` and create a session for the fixture recording.
    pub async fn connect_with_session(url: &str) -> Result<ReplayClient> {
        let config = ClientConfig {
            dispatch_url: url.to_string(),
            log_to_file: false,
            ..ClientConfig::default()
        };
        let client = ReplayClient::connect(config).await?;
        let session_id = client.create_session(&RecordingId::from(RECORDING_ID)).await?;
        info!("Test client connected with session {}", session_id);
        Ok(client)
    }
}

/// Polling helpers
pub mod wait {
    use std::time::Duration;

    /// Poll `condition` until it holds, panicking after five seconds.
    pub async fn wait_until(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}
