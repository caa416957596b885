use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use trace_format::{StreamWriter, TraceEvent};

use crate::{Result, TracerError};

/// Owns the output file for one recording session.
///
/// The JSON envelope prefix is written once when the sink opens; the suffix
/// is written by [`finish`], or by the stream writer's drop path if the sink
/// is released without one (a sink replaced by a later session start still
/// produces a parseable file). Sinks are replaced, never merged, across
/// sessions: opening truncates any existing file at the path.
///
/// [`finish`]: TraceSink::finish
#[derive(Debug)]
pub(crate) struct TraceSink {
    stream: StreamWriter<BufWriter<File>>,
}

impl TraceSink {
    pub(crate) fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_error = |source| TracerError::OpenSink {
            path: path.to_path_buf(),
            source,
        };
        let file = File::create(path).map_err(open_error)?;
        let stream = StreamWriter::new(BufWriter::new(file)).map_err(open_error)?;
        Ok(Self { stream })
    }

    pub(crate) fn write_event(&mut self, event: &TraceEvent) -> std::io::Result<()> {
        self.stream.write_event(event)
    }

    pub(crate) fn finish(&mut self) -> std::io::Result<()> {
        self.stream.finish()
    }

    pub(crate) fn events_written(&self) -> u64 {
        self.stream.events_written()
    }
}
