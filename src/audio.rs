//! Audio engine behind the dispatcher
//!
//! The dispatcher only needs two things from an engine: start a sound and
//! later ask whether it is still playing. [`RodioBackend`] provides them with
//! rodio; tests substitute their own backend.

use std::fs;
use std::io::Cursor;
use std::sync::Arc;

use rodio::source::ChannelVolume;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::error::PlaybackError;
use crate::registry::{Registry, Sound, SoundId};

/// Playback capability consumed by the dispatcher
pub trait AudioBackend {
    /// Handle to one in-flight sound
    type Handle;

    fn play(&mut self, id: SoundId, sound: &Sound) -> Result<Self::Handle, PlaybackError>;

    fn is_playing(&self, handle: &Self::Handle) -> bool;
}

/// Sound file bytes, decoded anew for every play
#[derive(Clone)]
struct LoadedSound {
    bytes: Arc<[u8]>,
}

pub struct RodioBackend {
    // Dropping the stream silences every sink
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sounds: Vec<LoadedSound>,
}

impl RodioBackend {
    /// Open the default output device and load every sound in `registry`.
    pub fn new(registry: &Registry) -> Result<Self, PlaybackError> {
        let sounds = load_sounds(registry)?;
        let (stream, handle) = OutputStream::try_default()?;
        tracing::info!(sounds = sounds.len(), "audio output opened");
        Ok(Self {
            _stream: stream,
            handle,
            sounds,
        })
    }
}

/// Read and test-decode every sound so bad assets fail at startup.
pub fn check_sounds(registry: &Registry) -> Result<usize, PlaybackError> {
    load_sounds(registry).map(|sounds| sounds.len())
}

fn load_sounds(registry: &Registry) -> Result<Vec<LoadedSound>, PlaybackError> {
    registry
        .sounds()
        .iter()
        .map(|sound| {
            tracing::debug!(name = %sound.name, file = %sound.file.display(), "opening sound file");
            let bytes: Arc<[u8]> = fs::read(&sound.file)
                .map_err(|source| PlaybackError::ReadAsset {
                    path: sound.file.clone(),
                    source,
                })?
                .into();
            Decoder::new(Cursor::new(Arc::clone(&bytes))).map_err(|source| {
                PlaybackError::DecodeAsset {
                    path: sound.file.clone(),
                    source,
                }
            })?;
            Ok(LoadedSound { bytes })
        })
        .collect()
}

/// Left/right gains for a pan position in `-1.0..=1.0`
fn pan_gains(pan: f32) -> [f32; 2] {
    let pan = pan.clamp(-1.0, 1.0);
    [1.0 - pan.max(0.0), 1.0 + pan.min(0.0)]
}

impl AudioBackend for RodioBackend {
    type Handle = Sink;

    fn play(&mut self, id: SoundId, sound: &Sound) -> Result<Sink, PlaybackError> {
        let loaded = self.sounds.get(id.0).ok_or(PlaybackError::UnknownSound {
            id: id.0,
            count: self.sounds.len(),
        })?;

        let decoder = Decoder::new(Cursor::new(Arc::clone(&loaded.bytes))).map_err(|source| {
            PlaybackError::DecodeAsset {
                path: sound.file.clone(),
                source,
            }
        })?;

        let mut source: Box<dyn Source<Item = i16> + Send> = Box::new(decoder);
        if let Some(speed) = sound.speed {
            source = Box::new(source.speed(speed));
        }
        if let Some(pan) = sound.pan {
            source = Box::new(ChannelVolume::new(source, pan_gains(pan).to_vec()));
        }

        let sink = Sink::try_new(&self.handle)?;
        if let Some(volume) = sound.volume {
            sink.set_volume(volume);
        }
        sink.append(source);
        Ok(sink)
    }

    fn is_playing(&self, handle: &Sink) -> bool {
        !handle.empty()
    }
}
