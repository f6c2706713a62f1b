//! Minuteman - scheduled reminders for a small group.
//!
//! Minuteman tracks one-time meetings, weekly recurring meetings, birthdays
//! and rotating notetaking-duty assignments. Every event category keeps a
//! sorted timeline with a "soon" warning loop and a "now" announcement loop;
//! schedules are persisted per group and reconciled after downtime (missed
//! meetings advance the duty rotations, recurring entries move to their next
//! future occurrence).
//!
//! The chat platform itself is an external collaborator behind the
//! [`announce::Notifier`] and [`announce::ChannelDirectory`] traits. This
//! binary runs the reminder engine headless: announcements go to standard
//! output and every group found under the storage root is picked up again at
//! startup.
//!
//! # Usage
//!
//! ```bash
//! minuteman --config config.yml --data ./groups
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Controls logging level (default: `info`)
//! - `MINUTEMAN_*` - Configuration overrides, see the [`config`] module

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};

use crate::announce::{ChannelDirectory, Notifier};
use crate::config::Config;
use crate::schedule::ScheduleRegistry;

mod alerts;
mod announce;
mod config;
mod schedule;
mod storage;

/// Command-line arguments for the minuteman bot.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Storage root directory, overriding the configuration file.
    #[arg(short, long)]
    data: Option<PathBuf>,
}

/// Notifier that prints announcements to standard output.
struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(&self, channel: &str, body: &str) -> bool {
        println!("[{channel}] {body}");
        true
    }
}

/// Directory with a single always-sendable console channel.
struct ConsoleDirectory;

impl ChannelDirectory for ConsoleDirectory {
    fn channels(&self) -> Vec<String> {
        vec!["console".to_string()]
    }

    fn can_send(&self, _channel: &str) -> bool {
        true
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Put logger at info level by default
    let env = Env::default().filter_or("RUST_LOG", "info");
    env_logger::init_from_env(env);

    info!("Starting minuteman {}...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let mut config = match Config::load(&args.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config file: {e}");
            return;
        }
    };
    if let Some(root) = args.data {
        config.storage.root = root;
    }

    let root = config.storage.root.clone();
    let mut registry = ScheduleRegistry::new(Arc::new(StdoutNotifier), config);

    for (id, name) in known_groups(&root) {
        registry.join(&id, &name, Arc::new(ConsoleDirectory)).await;
    }
    if registry.is_empty() {
        registry.join("0", "default", Arc::new(ConsoleDirectory)).await;
    }

    info!("reminder loops running, press ctrl-c to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
    }
    info!("shutting down");
    registry.shutdown().await;
}

/// Groups already on disk under the storage root, as (id, name) pairs parsed
/// from their `{id}-{name}` directory names.
fn known_groups(root: &Path) -> Vec<(String, String)> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("could not scan storage root {}: {e}", root.display());
            }
            return Vec::new();
        }
    };

    let mut groups = Vec::new();
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((id, group_name)) = name.split_once('-') {
            groups.push((id.to_string(), group_name.to_string()));
        }
    }
    groups
}
