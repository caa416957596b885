//! # scopetrace
//!
//! In-process event tracer. Application threads record begin/end/duration
//! events through a process-wide recorder; the events are buffered under a
//! lock and streamed on demand into a Chrome trace viewer JSON file
//! (`{"traceEvents":[...]}`, see [`trace_format`]).
//!
//! ## Recording a Session
//!
//! ```rust
//! use scopetrace::Phase;
//!
//! let path = std::env::temp_dir().join(format!("scopetrace-doc-{}.json", std::process::id()));
//! scopetrace::start_session(&path)?;
//!
//! scopetrace::log_event("app", "load", Phase::Begin);
//! scopetrace::log_event("app", "load", Phase::End);
//!
//! {
//!     let _scope = scopetrace::scoped_event("app", "compute");
//!     // work timed by the guard
//! }
//!
//! scopetrace::stop_session()?;
//! # std::fs::remove_file(&path).ok();
//! # Ok::<(), scopetrace::TracerError>(())
//! ```
//!
//! Events logged while no session is active are silently dropped; logging
//! never fails observably and never alters caller control flow. `start`,
//! `flush`, and `stop` surface I/O errors to the caller, who decides whether
//! tracing is optional or fatal.
//!
//! Timestamps come from `CLOCK_MONOTONIC` and are written as microseconds
//! relative to the session start. Buffer order is lock acquisition order,
//! which under contention is not wall-clock order; viewers sort by `ts`.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

pub mod event;
pub mod recorder;
pub mod scope;

mod macros;
mod sink;

pub use event::EventRecord;
pub use recorder::TraceRecorder;
pub use scope::TraceScope;
pub use trace_format::{Phase, Trace, TraceEvent};

#[derive(Error, Debug)]
pub enum TracerError {
    #[error("error opening trace file {}: {}", .path.display(), .source)]
    OpenSink {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("trace write failed: {0}")]
    Write(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TracerError>;

static TRACER: OnceLock<TraceRecorder> = OnceLock::new();

/// Process-wide recorder instance, created on first access and alive for the
/// remainder of the process.
///
/// The instance is process-wide so that instrumentation hooks invoked on
/// every traced function entry/exit can reach it without an explicit
/// reference. Because the instance is never dropped, a session left running
/// at process exit leaves its trace file unterminated; call [`stop_session`]
/// before exiting.
pub fn global() -> &'static TraceRecorder {
    TRACER.get_or_init(TraceRecorder::new)
}

/// Starts a recording session writing to `path`, replacing any active one.
///
/// See [`TraceRecorder::start`] for the replacement semantics.
pub fn start_session(path: impl AsRef<Path>) -> Result<()> {
    global().start(path)
}

/// Stops the active session, draining buffered events and finalizing the
/// trace file. No-op when idle.
pub fn stop_session() -> Result<()> {
    global().stop()
}

/// Writes all buffered events of the active session to the trace file.
/// No-op when idle.
pub fn flush_session() -> Result<()> {
    global().flush()
}

/// Records one event against the active session; silently dropped when no
/// session is active.
///
/// `phase` should be [`Phase::Begin`] or [`Phase::End`]; complete events
/// carry a duration and are emitted through [`scoped_event`] or
/// [`TraceRecorder::log_complete`].
pub fn log_event(category: &str, name: &str, phase: Phase) {
    global().log(category, name, phase);
}

/// Times the enclosing scope: returns a guard that emits one
/// [`Phase::Complete`] event when dropped.
pub fn scoped_event(category: &str, name: &str) -> TraceScope {
    TraceScope::new(category, name)
}

pub(crate) fn monotonic_now_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

pub(crate) fn current_tid() -> u32 {
    thread_local! {
        static TID: Cell<u32> = Cell::new(0);
    }
    TID.with(|cell| {
        let cached = cell.get();
        if cached != 0 {
            return cached;
        }
        let tid = unsafe { libc::syscall(libc::SYS_gettid) as u32 };
        cell.set(tid);
        tid
    })
}
