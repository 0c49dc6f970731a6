use super::{Record, Recorder};

/// A recorder that ignores any record.
#[derive(Debug, Default)]
pub struct NullRecorder {}

impl Recorder for NullRecorder {
    fn write(&mut self, _record: Record) {}
}
