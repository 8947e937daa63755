//! Wires tailers, queue and dispatcher together and decides what a tailer
//! failure means for the process.
//!
//! ```text
//! LogTailer ─► TriggerMatcher ─► EventQueue ─► Dispatcher ─► AudioBackend
//!   × N sources, one thread each               main thread
//!        │                            ▲
//!        └─ fatal ─► Supervisor ─ close
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::audio::AudioBackend;
use crate::dispatcher::Dispatcher;
use crate::error::{AppError, TailError};
use crate::matcher::TriggerMatcher;
use crate::queue::EventQueue;
use crate::registry::Registry;
use crate::settings::Settings;
use crate::tailer::{FatalHandler, LogTailer, spawn_tailer};

/// What to do when a tailer stops on an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalPolicy {
    /// Stop the pipeline and report the error
    Exit,
    /// Mark the source degraded and keep the others running. The pipeline
    /// still stops once every source has failed.
    Isolate,
}

impl FatalPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.isolate_failed_sources {
            Self::Isolate
        } else {
            Self::Exit
        }
    }
}

#[derive(Default)]
struct FailureState {
    degraded: Vec<PathBuf>,
    fatal: Option<TailError>,
}

/// Applies the [`FatalPolicy`] to tailer failures. A fatal failure is stored
/// and the event queue closed, which stops the dispatcher on the main thread.
pub struct Supervisor {
    policy: FatalPolicy,
    sources: usize,
    queue: Arc<EventQueue>,
    state: Mutex<FailureState>,
}

impl Supervisor {
    pub fn new(policy: FatalPolicy, sources: usize, queue: Arc<EventQueue>) -> Arc<Self> {
        Arc::new(Self {
            policy,
            sources,
            queue,
            state: Mutex::new(FailureState::default()),
        })
    }

    pub fn policy(&self) -> FatalPolicy {
        self.policy
    }

    pub fn handler(self: &Arc<Self>) -> FatalHandler {
        let supervisor = Arc::clone(self);
        Arc::new(move |path: &Path, err: TailError| supervisor.tailer_failed(path, err))
    }

    pub fn degraded(&self) -> Vec<PathBuf> {
        self.state.lock().degraded.clone()
    }

    /// The error that stopped the pipeline, if any. Taken at most once.
    pub fn take_fatal(&self) -> Option<TailError> {
        self.state.lock().fatal.take()
    }

    fn tailer_failed(&self, path: &Path, err: TailError) {
        tracing::error!(path = %path.display(), error = %err, "log tailer stopped");
        let mut state = self.state.lock();
        let fatal = match self.policy {
            FatalPolicy::Exit => err,
            FatalPolicy::Isolate => {
                state.degraded.push(path.to_path_buf());
                if state.degraded.len() < self.sources {
                    tracing::warn!(
                        path = %path.display(),
                        degraded = state.degraded.len(),
                        sources = self.sources,
                        "source marked degraded, other sources keep running"
                    );
                    return;
                }
                TailError::AllSourcesFailed {
                    sources: self.sources,
                    last: Box::new(err),
                }
            }
        };
        // the first fatal error wins
        if state.fatal.is_none() {
            state.fatal = Some(fatal);
        }
        drop(state);
        self.queue.close();
    }
}

pub struct Pipeline {
    registry: Arc<Registry>,
    queue: Arc<EventQueue>,
    supervisor: Arc<Supervisor>,
    tailers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Open every log file, then start one tailer thread per source.
    ///
    /// All files are opened before any thread starts so a missing file
    /// fails startup as a whole.
    pub fn start(registry: Arc<Registry>, settings: &Settings) -> Result<Self, TailError> {
        let queue = Arc::new(EventQueue::new(settings.queue_capacity, registry.rate_limits()));
        let matcher = TriggerMatcher::new(settings.timestamp_prefix_len);
        let supervisor = Supervisor::new(
            FatalPolicy::from_settings(settings),
            registry.sources().len(),
            Arc::clone(&queue),
        );

        let tailers = registry
            .sources()
            .iter()
            .map(|source| LogTailer::open(&source.path, settings.poll_interval()))
            .collect::<Result<Vec<_>, _>>()?;

        let on_fatal = supervisor.handler();
        let tailers = tailers
            .into_iter()
            .enumerate()
            .map(|(index, tailer)| {
                spawn_tailer(
                    tailer,
                    index,
                    Arc::clone(&registry),
                    matcher,
                    Arc::clone(&queue),
                    Arc::clone(&on_fatal),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            sources = tailers.len(),
            queue_capacity = settings.queue_capacity,
            policy = ?supervisor.policy(),
            "pipeline started"
        );

        Ok(Self {
            registry,
            queue,
            supervisor,
            tailers,
        })
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// Tailer threads that have not stopped
    pub fn running_tailers(&self) -> usize {
        self.tailers.iter().filter(|t| !t.is_finished()).count()
    }

    /// Run the dispatcher on the calling thread until playback fails or the
    /// supervisor stops the pipeline. Either way the cause is returned.
    pub fn run<B: AudioBackend>(&self, backend: B, channels: usize) -> Result<(), AppError> {
        let mut dispatcher = Dispatcher::new(&self.registry, backend, channels);
        if let Err(err) = dispatcher.run(&self.queue) {
            self.queue.close();
            return Err(err.into());
        }
        match self.supervisor.take_fatal() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
