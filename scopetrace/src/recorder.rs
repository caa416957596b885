use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use trace_format::Phase;
use tracing::{debug, warn};

use crate::event::EventRecord;
use crate::sink::TraceSink;
use crate::{monotonic_now_ns, Result, TracerError};

struct Inner {
    sink: Option<TraceSink>,
    buffer: Vec<EventRecord>,
    session_start_ns: u64,
}

/// Buffers event records from arbitrary threads and streams them into the
/// session's trace sink on flush.
///
/// The recorder is either idle or recording; a session spans one `start` /
/// `stop` pair and owns exactly one sink. All shared state sits behind one
/// lock, and the recording check and buffer append happen in the same
/// critical section, so a record can never be buffered after `stop` drained
/// the session. Record construction (allocation and clock reads) stays
/// outside the lock to keep the hot path short.
pub struct TraceRecorder {
    inner: Mutex<Inner>,
    // advisory mirror of `sink.is_some()` for the hot-path early return;
    // only written while the lock is held
    recording: AtomicBool,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sink: None,
                buffer: Vec::new(),
                session_start_ns: 0,
            }),
            recording: AtomicBool::new(false),
        }
    }

    /// Whether a session is currently active.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    /// Starts a session writing to `path`, truncating any existing file.
    ///
    /// Starting while already recording is permitted: the previous sink is
    /// finalized and replaced, and any buffered-but-unwritten records of
    /// the previous session are discarded with a warning. Callers that need
    /// those events must `flush` before restarting. On failure the previous
    /// session, if any, is left untouched.
    pub fn start(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let sink = TraceSink::open(path)?;
        let session_start_ns = monotonic_now_ns();

        let mut inner = self.inner.lock();
        if let Some(mut previous) = inner.sink.take() {
            if let Err(error) = previous.finish() {
                warn!(%error, "failed to finalize replaced trace sink");
            }
        }
        if !inner.buffer.is_empty() {
            warn!(
                discarded = inner.buffer.len(),
                "discarding events buffered by the previous session"
            );
            inner.buffer.clear();
        }
        inner.session_start_ns = session_start_ns;
        inner.sink = Some(sink);
        self.recording.store(true, Ordering::Relaxed);
        debug!(path = %path.display(), "trace session started");
        Ok(())
    }

    /// Records one event; silently dropped when no session is active.
    ///
    /// `phase` should be [`Phase::Begin`] or [`Phase::End`]. Complete
    /// events need an end timestamp and are submitted through
    /// [`log_complete`].
    ///
    /// [`log_complete`]: TraceRecorder::log_complete
    pub fn log(&self, category: &str, name: &str, phase: Phase) {
        if !self.is_recording() {
            return;
        }
        self.buffer_record(EventRecord::new(category, name, phase));
    }

    /// Records a pre-built, already-ended event with the same
    /// drop-if-not-recording rule as [`log`].
    ///
    /// [`log`]: TraceRecorder::log
    pub fn log_complete(&self, record: EventRecord) {
        if !self.is_recording() {
            return;
        }
        self.buffer_record(record);
    }

    fn buffer_record(&self, record: EventRecord) {
        let mut inner = self.inner.lock();
        // the advisory check above ran unlocked; the session may have
        // stopped since, in which case the record is dropped
        if inner.sink.is_none() {
            return;
        }
        inner.buffer.push(record);
    }

    /// Writes every buffered record to the sink in buffer order and empties
    /// the buffer. Idempotent; a no-op when idle or when nothing is
    /// buffered.
    ///
    /// On a write error the remaining records of the batch are dropped so
    /// the buffer is empty either way, and the error is surfaced.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::drain(&mut inner)
    }

    /// Ends the session: drains the buffer, finalizes the sink, and returns
    /// to idle. Later `log` calls are no-ops until the next `start`.
    /// A no-op when already idle.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.recording.store(false, Ordering::Relaxed);
        let drained = Self::drain(&mut inner);
        let closed = match inner.sink.take() {
            Some(mut sink) => {
                let result = sink.finish().map_err(TracerError::from);
                debug!(events = sink.events_written(), "trace session stopped");
                result
            }
            None => Ok(()),
        };
        drained.and(closed)
    }

    fn drain(inner: &mut Inner) -> Result<()> {
        let Inner {
            sink,
            buffer,
            session_start_ns,
        } = inner;
        let Some(sink) = sink.as_mut() else {
            debug_assert!(buffer.is_empty());
            return Ok(());
        };
        for record in buffer.drain(..) {
            sink.write_event(&record.into_trace_event(*session_start_ns))?;
        }
        Ok(())
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::path::PathBuf;
    use tempfile::TempDir;
    use trace_format::Trace;

    struct TestSetup {
        _temp_dir: TempDir,
        trace_path: PathBuf,
        recorder: TraceRecorder,
    }

    #[fixture]
    fn setup() -> TestSetup {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let trace_path = temp_dir.path().join("trace.json");
        TestSetup {
            _temp_dir: temp_dir,
            trace_path,
            recorder: TraceRecorder::new(),
        }
    }

    fn parse_trace(path: &Path) -> Trace {
        let contents = std::fs::read_to_string(path).expect("failed to read trace file");
        serde_json::from_str(&contents).expect("trace file is not valid json")
    }

    #[rstest]
    fn test_session_lifecycle(setup: TestSetup) {
        assert!(!setup.recorder.is_recording());

        setup.recorder.start(&setup.trace_path).unwrap();
        assert!(setup.recorder.is_recording());

        setup.recorder.log("test", "a", Phase::Begin);
        setup.recorder.log("test", "a", Phase::End);
        setup.recorder.stop().unwrap();
        assert!(!setup.recorder.is_recording());

        let trace = parse_trace(&setup.trace_path);
        assert_eq!(trace.trace_events.len(), 2);
        assert_eq!(trace.trace_events[0].ph, Phase::Begin);
        assert_eq!(trace.trace_events[1].ph, Phase::End);
    }

    #[rstest]
    fn test_events_before_start_are_dropped(setup: TestSetup) {
        setup.recorder.log("test", "early", Phase::Begin);

        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.log("test", "in-session", Phase::Begin);
        setup.recorder.stop().unwrap();

        let trace = parse_trace(&setup.trace_path);
        assert_eq!(trace.trace_events.len(), 1);
        assert_eq!(trace.trace_events[0].name, "in-session");
    }

    #[rstest]
    fn test_events_after_stop_are_dropped(setup: TestSetup) {
        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.stop().unwrap();

        setup.recorder.log("test", "late", Phase::Begin);
        assert!(!setup.recorder.is_recording());

        let trace = parse_trace(&setup.trace_path);
        assert!(trace.trace_events.is_empty());
    }

    #[rstest]
    fn test_multi_batch_flush_stays_well_formed(setup: TestSetup) {
        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.log("test", "first", Phase::Begin);
        setup.recorder.flush().unwrap();
        setup.recorder.log("test", "second", Phase::Begin);
        setup.recorder.flush().unwrap();
        setup.recorder.log("test", "third", Phase::Begin);
        setup.recorder.stop().unwrap();

        let trace = parse_trace(&setup.trace_path);
        let names: Vec<_> = trace
            .trace_events
            .iter()
            .map(|event| event.name.as_str())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    #[rstest]
    fn test_flush_when_idle_is_noop(setup: TestSetup) {
        setup.recorder.flush().unwrap();
        setup.recorder.stop().unwrap();
    }

    #[rstest]
    fn test_start_replaces_active_session(setup: TestSetup) {
        let second_path = setup._temp_dir.path().join("second.json");

        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.log("test", "buffered-then-lost", Phase::Begin);

        setup.recorder.start(&second_path).unwrap();
        setup.recorder.log("test", "kept", Phase::Begin);
        setup.recorder.stop().unwrap();

        // the replaced sink is closed without the unflushed record
        let first = parse_trace(&setup.trace_path);
        assert!(first.trace_events.is_empty());

        let second = parse_trace(&second_path);
        assert_eq!(second.trace_events.len(), 1);
        assert_eq!(second.trace_events[0].name, "kept");
    }

    #[rstest]
    fn test_failed_start_leaves_session_running(setup: TestSetup) {
        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.log("test", "survivor", Phase::Begin);

        let missing = setup.trace_path.join("not-a-dir").join("trace.json");
        assert!(setup.recorder.start(&missing).is_err());
        assert!(setup.recorder.is_recording());

        setup.recorder.log("test", "survivor", Phase::End);
        setup.recorder.stop().unwrap();

        let trace = parse_trace(&setup.trace_path);
        assert_eq!(trace.trace_events.len(), 2);
    }

    #[rstest]
    fn test_timestamps_are_session_relative(setup: TestSetup) {
        setup.recorder.start(&setup.trace_path).unwrap();
        setup.recorder.log("test", "a", Phase::Begin);
        std::thread::sleep(std::time::Duration::from_millis(5));
        setup.recorder.log("test", "a", Phase::End);
        setup.recorder.stop().unwrap();

        let trace = parse_trace(&setup.trace_path);
        let begin_ts = trace.trace_events[0].ts;
        let end_ts = trace.trace_events[1].ts;
        assert!(end_ts >= begin_ts + 5_000);
        assert!(begin_ts < 1_000_000, "ts should restart near zero per session");
    }
}
