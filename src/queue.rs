//! Bounded event queue with per-sound rate limiting
//!
//! Many tailer threads submit sounds, one dispatcher drains them.
//!
//! ```text
//!  tailer ─┐
//!  tailer ─┼─► submit() ──[ lock: rate limit + overflow + write ]──► ring
//!  tailer ─┘                                                         │
//!                                  dispatcher ◄── dequeue() ◄────────┘
//! ```
//!
//! Submitting never blocks: when the ring is full the event is dropped with a
//! warning so a slow consumer cannot stall the log sources. The rate limit
//! check and the ring write share one critical section, so two tailers can
//! never both win the same rate-limit window.
//!
//! [`EventQueue::close`] wakes the consumer and makes every later dequeue
//! return `None`; the supervisor uses it to stop the dispatcher on a fatal
//! tailer error.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::registry::SoundId;

/// What happened to a submitted sound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Enqueued,
    /// Still inside the sound's rate-limit window
    RateLimited,
    /// Queue full, event dropped
    Overflow,
}

/// Counters since the queue was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub rate_limited: u64,
    pub overflowed: u64,
}

/// Fixed ring of events. Indices run freely and are masked on access, so
/// `write == read` is empty and `write - read == capacity` is full.
struct Ring {
    slots: Box<[SoundId]>,
    mask: usize,
    write: usize,
    read: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SoundId(0); capacity].into_boxed_slice(),
            mask: capacity - 1,
            write: 0,
            read: 0,
        }
    }

    fn len(&self) -> usize {
        self.write.wrapping_sub(self.read)
    }

    fn is_empty(&self) -> bool {
        self.write == self.read
    }

    fn is_full(&self) -> bool {
        self.len() == self.slots.len()
    }

    fn push(&mut self, sound: SoundId) {
        self.slots[self.write & self.mask] = sound;
        self.write = self.write.wrapping_add(1);
    }

    fn pop(&mut self) -> Option<SoundId> {
        if self.is_empty() {
            return None;
        }
        let sound = self.slots[self.read & self.mask];
        self.read = self.read.wrapping_add(1);
        Some(sound)
    }
}

struct Shared {
    ring: Ring,
    rate_limits: Vec<Duration>,
    last_fired: Vec<Option<Instant>>,
    stats: QueueStats,
    closed: bool,
}

impl Shared {
    fn rate_limited(&self, sound: SoundId, now: Instant) -> bool {
        let interval = self.rate_limits.get(sound.0).copied().unwrap_or(Duration::ZERO);
        if interval.is_zero() {
            return false;
        }
        match self.last_fired.get(sound.0).copied().flatten() {
            Some(last) => now.saturating_duration_since(last) <= interval,
            None => false,
        }
    }
}

pub struct EventQueue {
    shared: Mutex<Shared>,
    available: Condvar,
}

impl EventQueue {
    /// `capacity` must be a non-zero power of two. `rate_limits` is indexed
    /// by `SoundId`; sounds past its end are never limited.
    ///
    /// # Panics
    /// If `capacity` is not a power of two. `Settings::validate` rejects such
    /// values before the pipeline is built.
    pub fn new(capacity: usize, rate_limits: Vec<Duration>) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "event queue capacity must be a power of two, got {capacity}"
        );
        let last_fired = vec![None; rate_limits.len()];
        Self {
            shared: Mutex::new(Shared {
                ring: Ring::new(capacity),
                rate_limits,
                last_fired,
                stats: QueueStats::default(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().ring.slots.len()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().ring.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.lock().stats
    }

    pub fn enqueue(&self, sound: SoundId) -> SubmitOutcome {
        self.submit(sound, Instant::now())
    }

    /// Rate-limit, then enqueue `sound` as if it fired at `now`.
    pub fn submit(&self, sound: SoundId, now: Instant) -> SubmitOutcome {
        let mut shared = self.shared.lock();

        if shared.rate_limited(sound, now) {
            shared.stats.rate_limited += 1;
            tracing::debug!(sound = sound.0, "sound suppressed by rate limit");
            return SubmitOutcome::RateLimited;
        }

        if shared.ring.is_full() {
            shared.stats.overflowed += 1;
            tracing::warn!(
                sound = sound.0,
                capacity = shared.ring.slots.len(),
                "event queue overflow, dropping event"
            );
            return SubmitOutcome::Overflow;
        }

        if let Some(last) = shared.last_fired.get_mut(sound.0) {
            *last = Some(now);
        }
        shared.ring.push(sound);
        shared.stats.enqueued += 1;
        drop(shared);

        self.available.notify_one();
        SubmitOutcome::Enqueued
    }

    /// Stop the consumer. Pending events are discarded.
    pub fn close(&self) {
        self.shared.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Block until an event is available. `None` once the queue is closed.
    pub fn dequeue(&self) -> Option<SoundId> {
        let mut shared = self.shared.lock();
        loop {
            if shared.closed {
                return None;
            }
            if let Some(sound) = shared.ring.pop() {
                return Some(sound);
            }
            tracing::trace!("event queue is empty");
            self.available.wait(&mut shared);
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<SoundId> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.shared.lock();
        loop {
            if shared.closed {
                return None;
            }
            if let Some(sound) = shared.ring.pop() {
                return Some(sound);
            }
            if self.available.wait_until(&mut shared, deadline).timed_out() {
                return if shared.closed { None } else { shared.ring.pop() };
            }
        }
    }

    pub fn try_dequeue(&self) -> Option<SoundId> {
        let mut shared = self.shared.lock();
        if shared.closed {
            return None;
        }
        shared.ring.pop()
    }
}
