//! Tensorboard output of training records.
use distrl_core::record::{Record, RecordValue, Recorder};
use log::{debug, warn};
use std::path::Path;
use tensorboard_rs::summary_writer::SummaryWriter;

/// Write records to TFRecord.
///
/// The agent step of a record is taken from its `step` entry, which the trainer adds
/// to every record it writes.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(logdir),
            step_key: "step".to_string(),
        }
    }

    /// Sets the key of the step entry.
    pub fn step_key(mut self, v: impl Into<String>) -> Self {
        self.step_key = v.into();
        self
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// Only [RecordValue::Scalar] values are written. Records without a step are
    /// dropped.
    fn write(&mut self, record: Record) {
        let step = match record.get(&self.step_key) {
            Some(RecordValue::Scalar(v)) => *v as usize,
            _ => {
                warn!("Record without scalar {:?} is not written", self.step_key);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                _ => debug!("Skip non-scalar value {}", k),
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
    }
}
