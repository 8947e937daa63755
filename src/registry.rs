//! Read-only tables built once at startup
//!
//! ```text
//! Registry
//!  ├── sounds:   [Sound]          indexed by SoundId
//!  ├── triggers: [Trigger]        indexed by TriggerId, each may point at a SoundId
//!  └── sources:  [LogSource]      each with an ordered list of TriggerAttachment
//! ```
//!
//! Nothing in here changes after construction. The registry is shared with
//! every tailer thread through an `Arc`; the only runtime-mutable per-sound
//! state (last-fired time) lives inside the event queue's lock.

use std::path::PathBuf;
use std::time::Duration;

use memchr::memmem;

/// Dense index of a sound in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundId(pub usize);

/// Dense index of a trigger in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(pub usize);

/// A playable sound and its rate limit
#[derive(Debug, Clone)]
pub struct Sound {
    pub name: String,
    pub file: PathBuf,
    /// Minimum time between two plays; zero disables limiting
    pub rate_limit: Duration,
    /// Overrides for the asset's default attributes
    pub volume: Option<f32>,
    pub pan: Option<f32>,
    pub speed: Option<f32>,
}

impl Sound {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            rate_limit: Duration::ZERO,
            volume: None,
            pan: None,
            speed: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// A named pattern, optionally bound to a sound
#[derive(Debug, Clone)]
pub struct Trigger {
    pub name: String,
    pub pattern: String,
    pub sound: Option<SoundId>,
    finder: memmem::Finder<'static>,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        sound: Option<SoundId>,
    ) -> Self {
        let pattern = pattern.into();
        let folded = pattern.to_ascii_lowercase();
        Self {
            name: name.into(),
            finder: memmem::Finder::new(folded.as_bytes()).into_owned(),
            pattern,
            sound,
        }
    }

    /// Search for the pattern in text that was already ASCII-lowercased.
    pub fn is_found_in(&self, folded: &[u8]) -> bool {
        self.finder.find(folded).is_some()
    }
}

/// Binding of a trigger to one log source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerAttachment {
    pub trigger: TriggerId,
    /// Stop evaluating later attachments for a line once this one matches
    pub stop_on_match: bool,
}

/// A watched log file and its triggers in evaluation order
#[derive(Debug, Clone)]
pub struct LogSource {
    pub path: PathBuf,
    pub attachments: Vec<TriggerAttachment>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    sounds: Vec<Sound>,
    triggers: Vec<Trigger>,
    sources: Vec<LogSource>,
}

impl Registry {
    pub fn new(sounds: Vec<Sound>, triggers: Vec<Trigger>, sources: Vec<LogSource>) -> Self {
        Self {
            sounds,
            triggers,
            sources,
        }
    }

    pub fn sound(&self, id: SoundId) -> Option<&Sound> {
        self.sounds.get(id.0)
    }

    pub fn trigger(&self, id: TriggerId) -> Option<&Trigger> {
        self.triggers.get(id.0)
    }

    pub fn sounds(&self) -> &[Sound] {
        &self.sounds
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn sources(&self) -> &[LogSource] {
        &self.sources
    }

    /// Rate limit intervals in `SoundId` order, used to seed the event queue.
    pub fn rate_limits(&self) -> Vec<Duration> {
        self.sounds.iter().map(|s| s.rate_limit).collect()
    }
}
