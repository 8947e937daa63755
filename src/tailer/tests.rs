//! Tests for LogTailer and the tailer thread
//!
//! Every test writes to a real temporary file, so the polling and truncation
//! paths run against actual file metadata.

use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::*;
use crate::queue::EventQueue;
use crate::registry::{LogSource, Sound, SoundId, Trigger, TriggerAttachment, TriggerId};

const POLL: Duration = Duration::from_millis(5);

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn append(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
}

fn log_with_history() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"[Mon Jan 01 00:00:00 2024] old line one\n").unwrap();
    file.write_all(b"[Mon Jan 01 00:00:01 2024] old line two\n").unwrap();
    file.flush().unwrap();
    file
}

// ═══════════════════════════════════════════════════════════════════════════
// Reading
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn skips_existing_content() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"new line\n");

    assert_eq!(tailer.next_line().unwrap(), "new line");
}

#[test]
fn returns_each_appended_line_in_order() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"one\ntwo\nthree\n");

    assert_eq!(tailer.next_line().unwrap(), "one");
    assert_eq!(tailer.next_line().unwrap(), "two");
    assert_eq!(tailer.next_line().unwrap(), "three");
}

#[test]
fn waits_for_partial_line_to_complete() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"par");
    let path = log.path().to_path_buf();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        append(&path, b"tial\n");
    });

    assert_eq!(tailer.next_line().unwrap(), "partial");
    writer.join().unwrap();
}

#[test]
fn blocks_until_file_grows() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    let path = log.path().to_path_buf();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        append(&path, b"late arrival\n");
    });

    assert_eq!(tailer.next_line().unwrap(), "late arrival");
    writer.join().unwrap();
}

#[test]
fn strips_crlf_and_decodes_windows_1252() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"caf\xe9 tells you\r\n");

    assert_eq!(tailer.next_line().unwrap(), "café tells you");
}

#[test]
fn empty_lines_are_returned() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"\nafter\n");

    assert_eq!(tailer.next_line().unwrap(), "");
    assert_eq!(tailer.next_line().unwrap(), "after");
}

// ═══════════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn truncation_is_fatal() {
    let log = log_with_history();
    let mut tailer = LogTailer::open(log.path(), POLL).unwrap();

    append(log.path(), b"before truncate\n");
    assert_eq!(tailer.next_line().unwrap(), "before truncate");

    log.as_file().set_len(0).unwrap();

    match tailer.next_line() {
        Err(TailError::Truncated { current, .. }) => assert_eq!(current, 0),
        other => panic!("expected truncation error, got {other:?}"),
    }
}

#[test]
fn missing_file_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let result = LogTailer::open(dir.path().join("nope.log"), POLL);
    assert!(matches!(result, Err(TailError::Open { .. })));
}

// ═══════════════════════════════════════════════════════════════════════════
// Tailer thread
// ═══════════════════════════════════════════════════════════════════════════

fn single_source_registry(path: &Path) -> Registry {
    Registry::new(
        vec![Sound::new("tell2", "tell.wav"), Sound::new("alert", "alert.wav")],
        vec![
            Trigger::new("tell", "tells you", Some(SoundId(0))),
            Trigger::new("mezzbreak", "has been awakened by", Some(SoundId(1))),
        ],
        vec![LogSource {
            path: path.to_path_buf(),
            attachments: vec![
                TriggerAttachment {
                    trigger: TriggerId(1),
                    stop_on_match: true,
                },
                TriggerAttachment {
                    trigger: TriggerId(0),
                    stop_on_match: false,
                },
            ],
        }],
    )
}

type Reported = Arc<Mutex<Vec<(PathBuf, TailError)>>>;

fn recording_handler() -> (FatalHandler, Reported) {
    let reported: Reported = Arc::default();
    let handler: FatalHandler = {
        let reported = Arc::clone(&reported);
        Arc::new(move |path: &Path, err: TailError| {
            reported.lock().unwrap().push((path.to_path_buf(), err));
        })
    };
    (handler, reported)
}

#[test]
fn tailer_thread_feeds_queue() {
    let log = log_with_history();
    let registry = Arc::new(single_source_registry(log.path()));
    let queue = Arc::new(EventQueue::new(8, registry.rate_limits()));
    let tailer = LogTailer::open(log.path(), POLL).unwrap();

    let _handle = spawn_tailer(
        tailer,
        0,
        Arc::clone(&registry),
        TriggerMatcher::new(27),
        Arc::clone(&queue),
        Arc::new(|_: &Path, _: TailError| {}),
    )
    .unwrap();

    append(
        log.path(),
        b"[Mon Jan 01 00:00:02 2024] Soandso tells you, 'hi'\n\
          [Mon Jan 01 00:00:03 2024] a goblin has been awakened by Soandso.\n",
    );

    assert_eq!(queue.dequeue_timeout(Duration::from_secs(5)), Some(SoundId(0)));
    assert_eq!(queue.dequeue_timeout(Duration::from_secs(5)), Some(SoundId(1)));
    assert_eq!(queue.dequeue_timeout(Duration::from_millis(50)), None);
}

#[test]
fn tailer_thread_reports_truncation() {
    let log = log_with_history();
    let registry = Arc::new(single_source_registry(log.path()));
    let queue = Arc::new(EventQueue::new(8, registry.rate_limits()));
    let tailer = LogTailer::open(log.path(), POLL).unwrap();

    let (on_fatal, reported) = recording_handler();
    let handle =
        spawn_tailer(tailer, 0, registry, TriggerMatcher::new(27), queue, on_fatal).unwrap();

    // let the tailer record its baseline before shrinking the file
    thread::sleep(Duration::from_millis(50));
    log.as_file().set_len(0).unwrap();

    handle.join().unwrap();
    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].0, log.path());
    assert!(matches!(reported[0].1, TailError::Truncated { .. }));
}

#[test]
fn tailer_thread_rejects_unknown_source() {
    let log = log_with_history();
    let registry = Arc::new(single_source_registry(log.path()));
    let queue = Arc::new(EventQueue::new(8, registry.rate_limits()));
    let tailer = LogTailer::open(log.path(), POLL).unwrap();

    let (on_fatal, reported) = recording_handler();
    let handle =
        spawn_tailer(tailer, 3, registry, TriggerMatcher::new(27), queue, on_fatal).unwrap();

    handle.join().unwrap();
    let reported = reported.lock().unwrap();
    assert_eq!(reported.len(), 1);
    assert!(matches!(reported[0].1, TailError::UnknownSource { index: 3, .. }));
}
