use trace_format::Phase;

use crate::event::EventRecord;

/// Times a lexical scope: construction stamps the start, dropping the guard
/// stamps the end and submits one [`Phase::Complete`] event to the
/// process-wide recorder.
///
/// Exactly one event is emitted per guard, on every exit path (normal
/// return, early return, or unwind). If no session is active when the guard
/// drops, the event is silently discarded like any other log call.
#[must_use = "the timed scope ends as soon as the guard is dropped"]
pub struct TraceScope {
    record: Option<EventRecord>,
}

impl TraceScope {
    pub fn new(category: &str, name: &str) -> Self {
        Self {
            record: Some(EventRecord::new(category, name, Phase::Complete)),
        }
    }
}

impl Drop for TraceScope {
    fn drop(&mut self) {
        if let Some(mut record) = self.record.take() {
            record.mark_ended();
            crate::global().log_complete(record);
        }
    }
}
