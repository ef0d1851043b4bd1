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

//! Client configuration
//!
//! Stored as TOML at `~/.replay.toml`. Missing keys fall back to defaults so
//! older files keep loading after new settings are added.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};
use tracing::{debug, info};

use crate::transport::TransportOptions;

/// Default dispatch endpoint
pub const DEFAULT_DISPATCH_URL: &str = "wss://dispatch.replay.io";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the dispatch service
    pub dispatch_url: String,
    /// Per-command timeout in milliseconds, 0 disables it
    pub command_timeout_ms: u64,
    /// How long reads of externally populated data (screenshots) wait, 0 waits forever
    pub external_cache_timeout_ms: u64,
    /// Number of pauses kept in the data model, 0 keeps all
    pub max_pause_count: usize,
    /// Whether the command line tools also log to a file
    pub log_to_file: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dispatch_url: DEFAULT_DISPATCH_URL.to_string(),
            command_timeout_ms: 0,
            external_cache_timeout_ms: 30_000,
            max_pause_count: 500,
            log_to_file: true,
        }
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl ClientConfig {
    /// Get the config file path (~/.replay.toml)
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| eyre::eyre!("Unable to determine home directory"))?;
        Ok(home.join(".replay.toml"))
    }

    /// Load configuration from the default path, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found, creating default at {:?}", config_path);
            let default_config = Self::default();
            default_config.save_to_path(&config_path)?;
            return Ok(default_config);
        }

        Self::load_from_path(&config_path)
    }

    /// Load configuration from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Self = toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))?;

        debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Transport settings derived from this configuration
    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions { command_timeout: non_zero_millis(self.command_timeout_ms) }
    }

    /// Bound for externally populated cache reads
    pub fn external_cache_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.external_cache_timeout_ms)
    }

    /// Pause limit for the data model
    pub fn pause_limit(&self) -> Option<usize> {
        (self.max_pause_count > 0).then_some(self.max_pause_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.toml");

        let config = ClientConfig {
            dispatch_url: "ws://127.0.0.1:8000".to_string(),
            command_timeout_ms: 1500,
            ..Default::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.transport_options().command_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.toml");
        fs::write(&path, "max_pause_count = 0\n").unwrap();

        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.dispatch_url, DEFAULT_DISPATCH_URL);
        assert_eq!(loaded.pause_limit(), None);
        assert_eq!(loaded.transport_options().command_timeout, None);
        assert_eq!(loaded.external_cache_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("replay.toml");
        fs::write(&path, "dispatch_url = [").unwrap();

        let err = ClientConfig::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    #[serial]
    fn test_load_creates_default_file_in_home() {
        let dir = TempDir::new().unwrap();
        let previous = std::env::var_os("HOME");
        std::env::set_var("HOME", dir.path());

        let created = ClientConfig::load();
        let path = ClientConfig::config_path();

        match previous {
            Some(home) => std::env::set_var("HOME", home),
            None => std::env::remove_var("HOME"),
        }

        assert_eq!(created.unwrap(), ClientConfig::default());
        let path = path.unwrap();
        assert_eq!(path, dir.path().join(".replay.toml"));
        assert!(path.exists());
    }
}
