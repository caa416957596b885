//! # Trace Format
//!
//! Rust types for the subset of the Chrome Trace Event Format emitted by an
//! in-process tracer, plus a streaming writer for the JSON Object Format
//! envelope.
//!
//! The Chrome Trace Event Format is a JSON-based format for recording
//! performance traces, processed by the Chrome Trace Viewer
//! (chrome://tracing) and compatible tools such as Perfetto. A trace is an
//! object containing a `traceEvents` array; each element describes one event
//! with a category, name, process and thread id, timestamp, and phase.
//!
//! ## Event Types
//!
//! - **Duration Events** (B/E): mark the beginning and end of an operation
//!   as two records
//! - **Complete Events** (X): one record carrying both the start timestamp
//!   and a duration
//!
//! ## Timestamps
//!
//! All timestamps are in microseconds, relative to whatever zero point the
//! producer chose (typically the start of the recording session). Events do
//! not need to be in timestamp-sorted order; viewers sort by `ts`.
//!
//! ## Streaming
//!
//! [`StreamWriter`] writes the envelope and records incrementally over any
//! [`std::io::Write`], so a trace never has to be held in memory as a whole.
//! The output stays parseable once [`StreamWriter::finish`] runs, and the
//! writer closes the envelope on drop if it was never finished explicitly.

use serde::{Deserialize, Serialize};
use std::io::Write;

/// Event phase, serialized as the single-character tag the trace viewer
/// expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Begin phase of a duration event. Paired with a corresponding
    /// [`Phase::End`] record.
    #[serde(rename = "B")]
    Begin,
    /// End phase of a duration event.
    #[serde(rename = "E")]
    End,
    /// Complete event combining begin and end into a single record with a
    /// `dur` field.
    #[serde(rename = "X")]
    Complete,
}

/// A single trace event record.
///
/// Field order matches the order the record is written in: `cat`, `name`,
/// `pid`, `tid`, `ts`, `ph`, and `dur` for complete events only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Category for filtering in the trace viewer.
    pub cat: String,
    /// Display name of the event.
    pub name: String,
    /// Process ID of the process that produced the event.
    pub pid: u32,
    /// Thread ID used to group events into per-thread lanes.
    pub tid: u32,
    /// Timestamp in microseconds, relative to the producer's zero point.
    pub ts: u64,
    /// Event phase.
    pub ph: Phase,
    /// Duration in microseconds. Present only for [`Phase::Complete`]
    /// records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<f64>,
}

/// The top-level trace document, `{"traceEvents": [...]}`.
///
/// [`StreamWriter`] produces this shape incrementally; `Trace` exists for
/// consumers that read a finished file back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    #[serde(rename = "traceEvents")]
    pub trace_events: Vec<TraceEvent>,
}

const ENVELOPE_PREFIX: &[u8] = b"{\n\"traceEvents\":\n[\n";
const ENVELOPE_SUFFIX: &[u8] = b"\n]\n}\n";
const RECORD_SEPARATOR: &[u8] = b",\n";

/// Incremental writer for the `{"traceEvents":[...]}` envelope.
///
/// The envelope prefix is written once at construction, each record on its
/// own comma-separated line, and the suffix exactly once by [`finish`] or on
/// drop. Records may be written in multiple batches; separator placement is
/// tracked across the writer's whole lifetime so the output remains a single
/// well-formed array.
///
/// [`finish`]: StreamWriter::finish
#[derive(Debug)]
pub struct StreamWriter<W: Write> {
    writer: W,
    events_written: u64,
    finished: bool,
}

impl<W: Write> StreamWriter<W> {
    /// Creates a writer and emits the envelope prefix.
    pub fn new(mut writer: W) -> Result<Self, std::io::Error> {
        writer.write_all(ENVELOPE_PREFIX)?;
        Ok(Self {
            writer,
            events_written: 0,
            finished: false,
        })
    }

    /// Appends one record to the `traceEvents` array.
    pub fn write_event(&mut self, event: &TraceEvent) -> Result<(), std::io::Error> {
        if self.events_written > 0 {
            self.writer.write_all(RECORD_SEPARATOR)?;
        }
        serde_json::to_writer(&mut self.writer, event)?;
        self.events_written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Writes the envelope suffix and flushes the underlying writer.
    ///
    /// Idempotent; later calls and the drop path become no-ops.
    pub fn finish(&mut self) -> Result<(), std::io::Error> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.write_all(ENVELOPE_SUFFIX)?;
        self.writer.flush()
    }
}

impl<W: Write> Drop for StreamWriter<W> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
