//! Polling log tailer, one per watched file
//!
//! Works like `tail -f`: the tailer starts at end-of-file and only ever sees
//! lines appended after it was opened. There is no file-change notification;
//! the file size is polled and a shrinking file is treated as fatal because
//! the read position can no longer be trusted.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use encoding_rs::WINDOWS_1252;
use memchr::memchr;

use crate::error::TailError;
use crate::matcher::{SoundSink, TriggerMatcher};
use crate::registry::Registry;

const READ_CHUNK: usize = 8 * 1024;

pub struct LogTailer {
    path: PathBuf,
    file: File,
    /// Size at the last stat, `None` until the first poll
    observed_size: Option<u64>,
    /// Bytes consumed from the file so far
    position: u64,
    /// Read but not yet returned; may end in a partial line
    pending: Vec<u8>,
    poll_interval: Duration,
}

impl LogTailer {
    pub fn open(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<Self, TailError> {
        let path = path.into();
        let mut file = File::open(&path).map_err(|source| TailError::Open {
            path: path.clone(),
            source,
        })?;
        let position = file.seek(SeekFrom::End(0)).map_err(|source| TailError::Seek {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            path,
            file,
            observed_size: None,
            position,
            pending: Vec::new(),
            poll_interval,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the next complete line is appended and return it without
    /// its line terminator.
    pub fn next_line(&mut self) -> Result<String, TailError> {
        loop {
            if let Some(line) = self.pop_line() {
                return Ok(line);
            }

            // Drain bytes we already know about before polling again. A short
            // read falls through to the stat below, which catches truncation.
            if self.observed_size.is_some_and(|size| self.position < size) && self.fill()? > 0 {
                continue;
            }

            let size = self.current_size()?;
            match self.observed_size {
                None => {
                    self.observed_size = Some(size);
                    if size <= self.position {
                        thread::sleep(self.poll_interval);
                    }
                }
                Some(previous) if size < previous || size < self.position => {
                    return Err(TailError::Truncated {
                        path: self.path.clone(),
                        previous: previous.max(self.position),
                        current: size,
                    });
                }
                Some(previous) if size > previous => {
                    tracing::trace!(path = %self.path.display(), previous, size, "log file grew");
                    self.observed_size = Some(size);
                }
                Some(_) => thread::sleep(self.poll_interval),
            }
        }
    }

    fn current_size(&self) -> Result<u64, TailError> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| TailError::Stat {
                path: self.path.clone(),
                source,
            })
    }

    fn fill(&mut self) -> Result<usize, TailError> {
        let mut chunk = [0u8; READ_CHUNK];
        let read = self.file.read(&mut chunk).map_err(|source| TailError::Read {
            path: self.path.clone(),
            source,
        })?;
        self.pending.extend_from_slice(&chunk[..read]);
        self.position += read as u64;
        Ok(read)
    }

    fn pop_line(&mut self) -> Option<String> {
        let end = memchr(b'\n', &self.pending)?;
        let mut raw: Vec<u8> = self.pending.drain(..=end).collect();
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let (line, _, _) = WINDOWS_1252.decode(&raw);
        Some(line.into_owned())
    }
}

/// Receives the error that stopped a tailer, with the source path
pub type FatalHandler = Arc<dyn Fn(&Path, TailError) + Send + Sync>;

/// Run `tailer` on its own thread, matching every line against the triggers
/// attached to `registry.sources()[source_index]`.
///
/// The thread only stops on error, which is handed to `on_fatal`.
pub fn spawn_tailer<S>(
    mut tailer: LogTailer,
    source_index: usize,
    registry: Arc<Registry>,
    matcher: TriggerMatcher,
    sink: Arc<S>,
    on_fatal: FatalHandler,
) -> Result<JoinHandle<()>, TailError>
where
    S: SoundSink + Send + Sync + 'static,
{
    let path = tailer.path().to_path_buf();
    let name = format!("tail-{source_index}");

    thread::Builder::new()
        .name(name)
        .spawn(move || {
            tracing::info!(path = %tailer.path().display(), "watching log file");
            if let Err(err) = follow(&mut tailer, source_index, &registry, &matcher, &*sink) {
                on_fatal(tailer.path(), err);
            }
        })
        .map_err(|source| TailError::Spawn { path, source })
}

fn follow<S: SoundSink + ?Sized>(
    tailer: &mut LogTailer,
    source_index: usize,
    registry: &Registry,
    matcher: &TriggerMatcher,
    sink: &S,
) -> Result<(), TailError> {
    let source = registry
        .sources()
        .get(source_index)
        .ok_or_else(|| TailError::UnknownSource {
            path: tailer.path().to_path_buf(),
            index: source_index,
        })?;
    loop {
        let line = tailer.next_line()?;
        tracing::trace!(path = %tailer.path().display(), line = %line, "got line");
        matcher.evaluate(&line, source, registry, sink);
    }
}

#[cfg(test)]
mod tests;
