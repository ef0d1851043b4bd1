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

//! Replay Inspect - query a recording from the command line
//!
//! Connects to a dispatch server, opens a session for one recording and prints
//! the requested data as JSON on stdout.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use replay_client::{ClientConfig, ReplayClient};
use replay_common::{logging, RecordingId};
use serde_json::json;
use std::{path::PathBuf, time::Duration};

/// Inspect a replay recording
#[derive(Debug, Parser)]
#[command(name = "replay-inspect")]
#[command(about = "Query sources, loaded regions and bounds of a recording", version)]
struct Args {
    /// Dispatch server URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Config file path (uses ~/.replay.toml if not specified)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Recording to open
    #[arg(long)]
    recording: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the sources of the recording
    Sources,
    /// Wait for loaded regions and print them
    Regions {
        /// How long to wait for the backend to report regions, in seconds
        #[arg(long, default_value = "10")]
        wait: u64,
    },
    /// Print the last point of the recording
    Endpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        ClientConfig::load_from_path(config_path)?
    } else {
        ClientConfig::load().unwrap_or_default()
    };
    if let Some(url) = args.url.clone() {
        config.dispatch_url = url;
    }

    if config.log_to_file {
        let log_file_path = logging::init_file_only_logging("replay-inspect")?;
        eprintln!("replay-inspect logs: {}", log_file_path.display());
    } else {
        logging::init_simple_logging(tracing::Level::WARN)?;
    }

    tracing::info!("Connecting to dispatch server at: {}", config.dispatch_url);
    let client = ReplayClient::connect(config.clone())
        .await
        .wrap_err_with(|| format!("Failed to connect to {}", config.dispatch_url))?;

    let result = run(&client, &args).await;
    client.close().await;
    result
}

async fn run(client: &ReplayClient, args: &Args) -> Result<()> {
    let recording_id = RecordingId::from(args.recording.as_str());
    client.create_session(&recording_id).await.wrap_err("Failed to create session")?;

    let output = match &args.command {
        Command::Sources => {
            let sources = client.find_sources().await?;
            serde_json::to_value(sources.as_slice())?
        }
        Command::Regions { wait } => {
            let deadline = tokio::time::Instant::now() + Duration::from_secs(*wait);
            let regions = loop {
                if let Some(regions) = client.get_loaded_regions() {
                    break regions;
                }
                if tokio::time::Instant::now() >= deadline {
                    eyre::bail!("No loaded regions reported within {}s", wait);
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            };
            json!({
                "regions": regions,
                "progress": regions.indexing_progress(),
            })
        }
        Command::Endpoint => serde_json::to_value(client.get_endpoint().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
