//! Runtime settings
//!
//! Persisted with confy under the `audiotriggers` app name. Every value can
//! be overridden from the command line.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const APP_NAME: &str = "audiotriggers";
const SETTINGS_NAME: &str = "settings";

fn default_definitions_file() -> PathBuf {
    PathBuf::from("audiotriggers.toml")
}

fn default_queue_capacity() -> usize {
    32
}

fn default_channels() -> usize {
    32
}

fn default_poll_interval_ms() -> u64 {
    10
}

// "[Mon Jan 01 00:00:00 2024] " is 27 characters
fn default_timestamp_prefix_len() -> usize {
    27
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Sound, trigger and log file definitions
    #[serde(default = "default_definitions_file")]
    pub definitions_file: PathBuf,

    /// Event queue size; must be a power of two
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Number of sounds that may play at once
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// How long a tailer sleeps when its file has not grown
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Leading bytes of each line skipped before matching
    #[serde(default = "default_timestamp_prefix_len")]
    pub timestamp_prefix_len: usize,

    /// Keep the other sources running when one tailer fails
    #[serde(default)]
    pub isolate_failed_sources: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            definitions_file: default_definitions_file(),
            queue_capacity: default_queue_capacity(),
            channels: default_channels(),
            poll_interval_ms: default_poll_interval_ms(),
            timestamp_prefix_len: default_timestamp_prefix_len(),
            isolate_failed_sources: false,
        }
    }
}

impl Settings {
    /// Load persisted settings, writing defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        confy::load(APP_NAME, SETTINGS_NAME).map_err(ConfigError::LoadSettings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 || !self.queue_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidSetting {
                name: "queue_capacity",
                reason: format!("{} is not a power of two", self.queue_capacity),
            });
        }
        if self.channels == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "channels",
                reason: "at least one channel is required".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
