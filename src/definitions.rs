//! Sound, trigger and log file definitions
//!
//! Definitions are a TOML document:
//!
//! ```toml
//! [[sound]]
//! name = "drum_left"
//! file = "media/jaguar.wav"
//! rate_limit_ms = 2000
//! pan = -1.0
//!
//! [[trigger]]
//! name = "mezzbreak"
//! pattern = "has been awakened by"
//! sound = "drum_left"
//!
//! [[log_file]]
//! path = "/home/corey/log1"
//!
//! [[log_file.trigger]]
//! name = "mezzbreak"
//! stop_on_match = true
//! ```
//!
//! [`Definitions::resolve`] turns names into indices and produces the
//! [`Registry`] the pipeline runs on. Any unresolved reference is fatal.
//! Relative sound files and log file paths are both resolved against the
//! directory of the definitions file; absolute paths are used as written.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry::{LogSource, Registry, Sound, SoundId, Trigger, TriggerAttachment, TriggerId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default, rename = "sound")]
    pub sounds: Vec<SoundDefinition>,

    #[serde(default, rename = "trigger")]
    pub triggers: Vec<TriggerDefinition>,

    #[serde(default, rename = "log_file")]
    pub log_files: Vec<LogFileDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundDefinition {
    pub name: String,

    /// Audio file, relative to the definitions file
    pub file: PathBuf,

    #[serde(default)]
    pub rate_limit_ms: u64,

    #[serde(default)]
    pub volume: Option<f32>,

    /// -1.0 (left) to 1.0 (right)
    #[serde(default)]
    pub pan: Option<f32>,

    /// Playback speed multiplier
    #[serde(default)]
    pub speed: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDefinition {
    pub name: String,
    pub pattern: String,

    /// Sound to play; a trigger without one matches silently
    #[serde(default)]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileDefinition {
    /// Log file, relative to the definitions file
    pub path: PathBuf,

    #[serde(default, rename = "trigger")]
    pub triggers: Vec<AttachmentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentDefinition {
    pub name: String,

    #[serde(default)]
    pub stop_on_match: bool,
}

impl Definitions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadDefinitions {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolve names to indices. Relative sound files and log file paths are
    /// joined onto `base_dir`.
    pub fn resolve(&self, base_dir: &Path) -> Result<Registry, ConfigError> {
        let mut sound_ids: HashMap<&str, SoundId> = HashMap::with_capacity(self.sounds.len());
        let mut sounds = Vec::with_capacity(self.sounds.len());

        for def in &self.sounds {
            let id = SoundId(sounds.len());
            if sound_ids.insert(def.name.as_str(), id).is_some() {
                return Err(ConfigError::DuplicateSound {
                    name: def.name.clone(),
                });
            }
            sounds.push(Sound {
                name: def.name.clone(),
                file: base_dir.join(&def.file),
                rate_limit: Duration::from_millis(def.rate_limit_ms),
                volume: def.volume,
                pan: def.pan.map(|p| p.clamp(-1.0, 1.0)),
                speed: def.speed,
            });
        }

        let mut trigger_ids: HashMap<&str, TriggerId> =
            HashMap::with_capacity(self.triggers.len());
        let mut triggers = Vec::with_capacity(self.triggers.len());

        for def in &self.triggers {
            if def.pattern.is_empty() {
                return Err(ConfigError::EmptyPattern {
                    trigger: def.name.clone(),
                });
            }
            let sound = match &def.sound {
                Some(name) => Some(*sound_ids.get(name.as_str()).ok_or_else(|| {
                    ConfigError::UnknownSound {
                        trigger: def.name.clone(),
                        sound: name.clone(),
                    }
                })?),
                None => None,
            };
            let id = TriggerId(triggers.len());
            if trigger_ids.insert(def.name.as_str(), id).is_some() {
                return Err(ConfigError::DuplicateTrigger {
                    name: def.name.clone(),
                });
            }
            triggers.push(Trigger::new(def.name.as_str(), def.pattern.as_str(), sound));
        }

        if self.log_files.is_empty() {
            return Err(ConfigError::NoLogFiles);
        }

        let sources = self
            .log_files
            .iter()
            .map(|def| {
                let path = base_dir.join(&def.path);
                let attachments = def
                    .triggers
                    .iter()
                    .map(|att| {
                        let trigger = *trigger_ids.get(att.name.as_str()).ok_or_else(|| {
                            ConfigError::UnknownTrigger {
                                path: path.clone(),
                                trigger: att.name.clone(),
                            }
                        })?;
                        Ok(TriggerAttachment {
                            trigger,
                            stop_on_match: att.stop_on_match,
                        })
                    })
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok(LogSource { path, attachments })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Registry::new(sounds, triggers, sources))
    }
}
