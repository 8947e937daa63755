//! Event dispatch and playback channel allocation
//!
//! The dispatcher is the single consumer of the event queue and the only
//! owner of the channel pool, so channel slots need no locking.
//!
//! Slot lifecycle:
//!
//! ```text
//! Unused ──dispatch──► Playing ──observed finished on a later scan──► Unused
//! ```

use crate::audio::AudioBackend;
use crate::error::PlaybackError;
use crate::queue::EventQueue;
use crate::registry::{Registry, SoundId};

/// Fixed pool of playback channels
pub struct ChannelAllocator<H> {
    slots: Vec<Option<H>>,
}

impl<H> ChannelAllocator<H> {
    pub fn new(channels: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(channels).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// First slot that is unused or whose sound has finished.
    pub fn find_free<B>(&mut self, backend: &B) -> Option<usize>
    where
        B: AudioBackend<Handle = H>,
    {
        let index = self.slots.iter().position(|slot| match slot {
            None => true,
            Some(handle) => !backend.is_playing(handle),
        })?;
        // Finished handles are released as soon as they are found
        self.slots[index] = None;
        Some(index)
    }

    pub fn claim(&mut self, index: usize, handle: H) {
        self.slots[index] = Some(handle);
    }

    /// Slots still holding a handle, finished or not
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Played { channel: usize },
    /// Every channel busy, event dropped
    NoFreeChannel,
}

pub struct Dispatcher<'a, B: AudioBackend> {
    registry: &'a Registry,
    backend: B,
    channels: ChannelAllocator<B::Handle>,
}

impl<'a, B: AudioBackend> Dispatcher<'a, B> {
    pub fn new(registry: &'a Registry, backend: B, channels: usize) -> Self {
        Self {
            registry,
            backend,
            channels: ChannelAllocator::new(channels),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn channels(&self) -> &ChannelAllocator<B::Handle> {
        &self.channels
    }

    /// Play one event. Playback errors are fatal; a full channel pool is not.
    pub fn dispatch(&mut self, sound_id: SoundId) -> Result<DispatchOutcome, PlaybackError> {
        let registry = self.registry;
        let sound = registry.sound(sound_id).ok_or(PlaybackError::UnknownSound {
            id: sound_id.0,
            count: registry.sounds().len(),
        })?;

        let Some(channel) = self.channels.find_free(&self.backend) else {
            tracing::warn!(
                sound = %sound.name,
                channels = self.channels.len(),
                "no free channels, dropping event"
            );
            return Ok(DispatchOutcome::NoFreeChannel);
        };

        let handle = self.backend.play(sound_id, sound)?;
        self.channels.claim(channel, handle);
        tracing::debug!(sound = %sound.name, channel, "playing sound");
        Ok(DispatchOutcome::Played { channel })
    }

    /// Dispatch events until the queue is closed or playback fails.
    pub fn run(&mut self, queue: &EventQueue) -> Result<(), PlaybackError> {
        while let Some(sound_id) = queue.dequeue() {
            tracing::trace!(sound = sound_id.0, "dispatcher received event");
            self.dispatch(sound_id)?;
        }
        tracing::debug!("event queue closed, dispatcher stopping");
        Ok(())
    }
}
