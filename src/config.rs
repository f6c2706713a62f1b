//! Configuration file structures for the minuteman bot.
//!
//! Configuration is read from a YAML file, with every value overridable
//! through `MINUTEMAN_`-prefixed environment variables (`__` separates
//! sections). All fields have defaults, so an empty or missing file yields a
//! working configuration.
//!
//! # Configuration File Format
//!
//! ```yaml
//! storage:
//!   # Directory holding one subdirectory per group
//!   root: "./groups"
//!
//! alerts:
//!   # Minutes between the "soon" warning and the event itself
//!   lead_minutes: 10
//!   # Time of day birthday alerts fire at
//!   birthday_hour: 8
//!   birthday_minute: 0
//!
//! limits:
//!   max_meetings: 64
//!   max_weekly_meetings: 16
//!   max_birthdays: 128
//!   max_rotation: 32
//! ```
//!
//! # Environment Variable Overrides
//!
//! ```bash
//! export MINUTEMAN_STORAGE__ROOT="/var/lib/minuteman"
//! export MINUTEMAN_ALERTS__LEAD_MINUTES=15
//! ```

use std::path::PathBuf;

use anyhow::Context;
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;

/// Root configuration structure.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub limits: Limits,
}

impl Config {
    /// Loads the configuration from a YAML file merged with environment
    /// variable overrides. A missing file is not an error.
    pub fn load(path: &str) -> anyhow::Result<Config> {
        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MINUTEMAN_").split("__"))
            .extract()
            .with_context(|| format!("failed to load configuration from {path}"))
    }
}

/// Where group schedules are persisted.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per group.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            root: PathBuf::from("./groups"),
        }
    }
}

/// Alert timing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    /// Minutes between the "soon" warning and the event itself.
    pub lead_minutes: i64,
    /// Hour of day birthday alerts fire at.
    pub birthday_hour: u32,
    pub birthday_minute: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig {
            lead_minutes: 10,
            birthday_hour: 8,
            birthday_minute: 0,
        }
    }
}

/// Per-category entry limits.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    pub max_meetings: usize,
    pub max_weekly_meetings: usize,
    pub max_birthdays: usize,
    pub max_rotation: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_meetings: 64,
            max_weekly_meetings: 16,
            max_birthdays: 128,
            max_rotation: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = Config::load("/nonexistent/minuteman.yml").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.alerts.lead_minutes, 10);
        assert_eq!(config.limits.max_weekly_meetings, 16);
    }

    #[test]
    fn test_yaml_values_override_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "storage:\n  root: \"/tmp/groups\"\nalerts:\n  lead_minutes: 3\nlimits:\n  max_meetings: 5\n"
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.storage.root, PathBuf::from("/tmp/groups"));
        assert_eq!(config.alerts.lead_minutes, 3);
        assert_eq!(config.limits.max_meetings, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.alerts.birthday_hour, 8);
        assert_eq!(config.limits.max_rotation, 32);
    }
}
