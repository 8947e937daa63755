//! Error types for the trigger pipeline
//!
//! Startup problems surface as [`ConfigError`], tailer failures as
//! [`TailError`] and audio engine failures as [`PlaybackError`]. All three
//! are fatal; queue overflow and channel exhaustion are not errors at all and
//! are handled where they happen.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading settings or resolving trigger definitions
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read definitions file {path}")]
    ReadDefinitions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse definitions")]
    ParseDefinitions(#[from] toml::de::Error),

    #[error("failed to load settings")]
    LoadSettings(#[source] confy::ConfyError),

    #[error("duplicate sound name '{name}'")]
    DuplicateSound { name: String },

    #[error("duplicate trigger name '{name}'")]
    DuplicateTrigger { name: String },

    #[error("trigger '{trigger}' has an empty pattern")]
    EmptyPattern { trigger: String },

    #[error("unable to find sound '{sound}' for trigger '{trigger}'")]
    UnknownSound { trigger: String, sound: String },

    #[error("unable to find trigger '{trigger}' for log file {path}")]
    UnknownTrigger { path: PathBuf, trigger: String },

    #[error("no log files configured")]
    NoLogFiles,

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// Errors raised by a log tailer after its file was opened
#[derive(Debug, Error)]
pub enum TailError {
    #[error("failed to open log file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to seek to end of log file {path}")]
    Seek {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to stat log file {path}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read log file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("log file {path} was truncated ({previous} -> {current} bytes)")]
    Truncated {
        path: PathBuf,
        previous: u64,
        current: u64,
    },

    #[error("failed to spawn tailer thread for {path}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no log source {index} configured for tailer on {path}")]
    UnknownSource { path: PathBuf, index: usize },

    #[error("all {sources} log files have failed")]
    AllSourcesFailed {
        sources: usize,
        #[source]
        last: Box<TailError>,
    },
}

/// Errors from the audio engine
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to open audio output device")]
    OutputDevice(#[from] rodio::StreamError),

    #[error("failed to read sound file {path}")]
    ReadAsset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode sound file {path}")]
    DecodeAsset {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },

    #[error("failed to create playback channel")]
    Channel(#[from] rodio::PlayError),

    #[error("sound id {id} is out of range ({count} sounds loaded)")]
    UnknownSound { id: usize, count: usize },
}

/// Top-level error returned by the binary
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tail(#[from] TailError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}
