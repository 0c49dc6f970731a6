use super::Record;

/// Writes a record to an output destination with [`Recorder::write`].
///
/// The trainer writes one record per logging tick. The record carries the agent step
/// under the key `"step"`.
pub trait Recorder {
    /// Writes a record.
    fn write(&mut self, record: Record);

    /// Flushes buffered output, if any.
    fn flush(&mut self) {}
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn write(&mut self, record: Record) {
        (**self).write(record)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
