pub mod audio;
pub mod definitions;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod matcher;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod settings;
pub mod tailer;

pub use audio::{AudioBackend, RodioBackend};
pub use definitions::Definitions;
pub use dispatcher::{ChannelAllocator, DispatchOutcome, Dispatcher};
pub use error::{AppError, ConfigError, PlaybackError, TailError};
pub use matcher::{MatchOutcome, SoundSink, TriggerMatcher};
pub use pipeline::{FatalPolicy, Pipeline, Supervisor};
pub use queue::{EventQueue, QueueStats, SubmitOutcome};
pub use registry::{LogSource, Registry, Sound, SoundId, Trigger, TriggerAttachment, TriggerId};
pub use settings::Settings;
pub use tailer::{LogTailer, spawn_tailer};
