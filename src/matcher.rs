//! Trigger matching for a single log line
//!
//! Attachments are evaluated in declared order against the part of the line
//! after the timestamp prefix. Every matching trigger with a sound submits
//! it; a matching attachment with `stop_on_match` ends evaluation for that
//! line.
//!
//! Lines arrive decoded from Windows-1252, where every byte became exactly one
//! `char`, so the prefix is skipped in characters to stay aligned with the
//! bytes in the file.

use crate::queue::{EventQueue, SubmitOutcome};
use crate::registry::{LogSource, Registry, SoundId};

/// Receives the sounds a line asks to play
pub trait SoundSink {
    fn push_sound(&self, sound: SoundId) -> SubmitOutcome;
}

impl SoundSink for EventQueue {
    fn push_sound(&self, sound: SoundId) -> SubmitOutcome {
        self.enqueue(sound)
    }
}

/// Result of evaluating one line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Attachments that matched, including silent ones
    pub matched: usize,
    /// Sounds handed to the sink, whatever the sink did with them
    pub submitted: usize,
    /// Evaluation ended early on a stop-on-match attachment
    pub stopped: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerMatcher {
    prefix_len: usize,
}

impl TriggerMatcher {
    /// `prefix_len` leading bytes of every raw line are skipped before
    /// matching.
    pub fn new(prefix_len: usize) -> Self {
        Self { prefix_len }
    }

    pub fn evaluate<S: SoundSink + ?Sized>(
        &self,
        line: &str,
        source: &LogSource,
        registry: &Registry,
        sink: &S,
    ) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        let Some(message) = skip_chars(line, self.prefix_len) else {
            return outcome;
        };
        let folded = message.as_bytes().to_ascii_lowercase();

        for attachment in &source.attachments {
            let Some(trigger) = registry.trigger(attachment.trigger) else {
                continue;
            };
            if !trigger.is_found_in(&folded) {
                continue;
            }

            outcome.matched += 1;
            tracing::debug!(trigger = %trigger.name, line, "trigger matched");

            if let Some(sound) = trigger.sound {
                sink.push_sound(sound);
                outcome.submitted += 1;
            }
            if attachment.stop_on_match {
                outcome.stopped = true;
                break;
            }
        }

        outcome
    }
}

fn skip_chars(line: &str, count: usize) -> Option<&str> {
    let mut chars = line.chars();
    for _ in 0..count {
        chars.next()?;
    }
    Some(chars.as_str())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::PathBuf;

    use super::*;
    use crate::registry::{Sound, Trigger, TriggerAttachment, TriggerId};

    #[derive(Default)]
    struct Recorder(RefCell<Vec<SoundId>>);

    impl SoundSink for Recorder {
        fn push_sound(&self, sound: SoundId) -> SubmitOutcome {
            self.0.borrow_mut().push(sound);
            SubmitOutcome::Enqueued
        }
    }

    impl Recorder {
        fn sounds(&self) -> Vec<usize> {
            self.0.borrow().iter().map(|s| s.0).collect()
        }
    }

    fn attach(trigger: usize, stop_on_match: bool) -> TriggerAttachment {
        TriggerAttachment {
            trigger: TriggerId(trigger),
            stop_on_match,
        }
    }

    /// Three sounds and four triggers:
    /// 0 "has been awakened by" -> sound 0
    /// 1 "awakened"             -> sound 1
    /// 2 "by"                   -> sound 2
    /// 3 "awakened"             -> no sound
    fn registry(attachments: Vec<TriggerAttachment>) -> Registry {
        Registry::new(
            vec![
                Sound::new("drum_left", "a.wav"),
                Sound::new("drum_right", "b.wav"),
                Sound::new("tell2", "c.wav"),
            ],
            vec![
                Trigger::new("mezzbreak", "has been awakened by", Some(SoundId(0))),
                Trigger::new("awake", "awakened", Some(SoundId(1))),
                Trigger::new("by", "by", Some(SoundId(2))),
                Trigger::new("silent", "AWAKENED", None),
            ],
            vec![LogSource {
                path: PathBuf::from("log1"),
                attachments,
            }],
        )
    }

    const LINE: &str = "2024-01-01T00:00:00Z has been awakened by X";
    const PREFIX: usize = "2024-01-01T00:00:00Z ".len();

    #[test]
    fn stop_on_match_skips_later_attachments() {
        let registry = registry(vec![attach(0, true), attach(1, false), attach(2, false)]);
        let sink = Recorder::default();

        let outcome =
            TriggerMatcher::new(PREFIX).evaluate(LINE, &registry.sources()[0], &registry, &sink);

        assert_eq!(sink.sounds(), vec![0]);
        assert_eq!(outcome.matched, 1);
        assert!(outcome.stopped);
    }

    #[test]
    fn without_stop_every_match_fires_in_order() {
        let registry = registry(vec![attach(2, false), attach(0, false), attach(1, false)]);
        let sink = Recorder::default();

        let outcome =
            TriggerMatcher::new(PREFIX).evaluate(LINE, &registry.sources()[0], &registry, &sink);

        assert_eq!(sink.sounds(), vec![2, 0, 1]);
        assert_eq!(outcome.submitted, 3);
        assert!(!outcome.stopped);
    }

    #[test]
    fn stop_only_applies_when_that_attachment_matches() {
        let registry = registry(vec![attach(0, false), attach(1, true), attach(2, false)]);
        let sink = Recorder::default();

        TriggerMatcher::new(PREFIX).evaluate(
            "2024-01-01T00:00:00Z you feel awakened",
            &registry.sources()[0],
            &registry,
            &sink,
        );

        assert_eq!(sink.sounds(), vec![1]);
    }

    #[test]
    fn silent_trigger_matches_without_submitting() {
        let registry = registry(vec![attach(3, true), attach(1, false)]);
        let sink = Recorder::default();

        let outcome =
            TriggerMatcher::new(PREFIX).evaluate(LINE, &registry.sources()[0], &registry, &sink);

        assert!(sink.sounds().is_empty());
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.submitted, 0);
        assert!(outcome.stopped);
    }

    #[test]
    fn prefix_is_not_searched() {
        let registry = registry(vec![attach(2, false)]);
        let sink = Recorder::default();

        // "by" only appears inside the skipped prefix
        TriggerMatcher::new(10).evaluate(
            "standby.. hello",
            &registry.sources()[0],
            &registry,
            &sink,
        );

        assert!(sink.sounds().is_empty());
    }

    #[test]
    fn lines_shorter_than_prefix_are_ignored() {
        let registry = registry(vec![attach(2, false)]);
        let sink = Recorder::default();

        let outcome =
            TriggerMatcher::new(27).evaluate("by by by", &registry.sources()[0], &registry, &sink);

        assert_eq!(outcome, MatchOutcome::default());
        assert!(sink.sounds().is_empty());
    }

    #[test]
    fn matching_ignores_case() {
        let registry = registry(vec![attach(0, true)]);
        let sink = Recorder::default();

        TriggerMatcher::new(0).evaluate(
            "A Goblin HAS BEEN Awakened BY you",
            &registry.sources()[0],
            &registry,
            &sink,
        );

        assert_eq!(sink.sounds(), vec![0]);
    }

    #[test]
    fn prefix_counts_decoded_bytes_as_one_column() {
        let registry = registry(vec![attach(2, false)]);
        let sink = Recorder::default();

        // two raw Windows-1252 bytes before "by", each decoded to a two-byte char
        let source = &registry.sources()[0];
        TriggerMatcher::new(4).evaluate("\u{e9}\u{e9}byXhello", source, &registry, &sink);
        assert!(sink.sounds().is_empty());

        TriggerMatcher::new(2).evaluate("\u{e9}\u{e9}by", source, &registry, &sink);
        assert_eq!(sink.sounds(), vec![2]);
    }

    #[test]
    fn feeds_event_queue() {
        let registry = registry(vec![attach(0, true), attach(1, false), attach(2, false)]);
        let queue = EventQueue::new(4, registry.rate_limits());

        TriggerMatcher::new(PREFIX).evaluate(LINE, &registry.sources()[0], &registry, &queue);

        assert_eq!(queue.try_dequeue(), Some(SoundId(0)));
        assert!(queue.is_empty());
    }
}
