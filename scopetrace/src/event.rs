use trace_format::{Phase, TraceEvent};

use crate::{current_tid, monotonic_now_ns};

/// One trace point: category, name, phase, and the identity of the thread
/// that created it, stamped with the monotonic clock at construction.
///
/// Records are self-contained and do not know about the recording session;
/// the session-relative timestamp offset is computed at serialization time
/// by [`into_trace_event`], against the start time of the session that
/// buffered the record.
///
/// [`into_trace_event`]: EventRecord::into_trace_event
#[derive(Debug, Clone)]
pub struct EventRecord {
    category: String,
    name: String,
    phase: Phase,
    tid: u32,
    pid: u32,
    created_at_ns: u64,
    ended_at_ns: Option<u64>,
}

impl EventRecord {
    pub fn new(category: impl Into<String>, name: impl Into<String>, phase: Phase) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
            phase,
            tid: current_tid(),
            pid: std::process::id(),
            created_at_ns: monotonic_now_ns(),
            ended_at_ns: None,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Stamps the end timestamp of a [`Phase::Complete`] record. Last write
    /// wins; callers are expected to call this exactly once.
    pub fn mark_ended(&mut self) {
        self.ended_at_ns = Some(monotonic_now_ns());
    }

    /// Elapsed microseconds between construction and [`mark_ended`].
    ///
    /// # Panics
    ///
    /// Panics if the end was never marked. That is a caller bug, not a
    /// recoverable condition.
    ///
    /// [`mark_ended`]: EventRecord::mark_ended
    pub fn duration_micros(&self) -> f64 {
        let ended = self
            .ended_at_ns
            .expect("duration requested for an event whose end was never marked");
        ended.saturating_sub(self.created_at_ns) as f64 / 1_000.0
    }

    /// Converts the record to its wire form, computing the `ts` offset
    /// against the session start time.
    ///
    /// A record created before the session started clamps to `ts = 0`
    /// rather than underflowing.
    pub(crate) fn into_trace_event(self, session_start_ns: u64) -> TraceEvent {
        let ts = self.created_at_ns.saturating_sub(session_start_ns) / 1_000;
        let dur = match self.phase {
            Phase::Complete => Some(self.duration_micros()),
            _ => None,
        };
        TraceEvent {
            cat: self.category,
            name: self.name,
            pid: self.pid,
            tid: self.tid,
            ts,
            ph: self.phase,
            dur,
        }
    }
}
