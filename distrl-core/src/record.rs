//! Types and traits for recording training metrics.
//!
//! * [`Record`] - key-value container of [`RecordValue`]s
//! * [`Recorder`] - output destination of records
//! * [`RecordStorage`] - aggregates stored records between two writes
//! * [`BufferedRecorder`] - keeps records in memory, used in tests
//! * [`NullRecorder`] - discards records
//!
//! ```rust
//! use distrl_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("train/loss", 0.7);
//! record.insert("train/learn_rate", RecordValue::Scalar(1e-4));
//! assert_eq!(record.get_scalar("train/loss").unwrap(), 0.7);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;
mod storage;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
pub use storage::RecordStorage;
