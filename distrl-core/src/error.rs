//! Errors in the library.
use thiserror::Error;

/// Errors raised by the transition store, the projector, configuration checks and records.
#[derive(Debug, Error)]
pub enum DistrlError {
    /// Key not found in a record.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value of an unexpected type.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Invalid configuration, raised at construction.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Too few transitions stored to sample.
    #[error("Insufficient data in the replay buffer: size {size}, required at least {required}")]
    InsufficientData {
        /// Stored frames.
        size: usize,

        /// Frames needed to sample.
        required: usize,
    },

    /// A probability row is not a distribution.
    #[error("Numerical invariant violated: {0}")]
    NumericalInvariant(String),

    /// Data of the wrong length.
    #[error("Shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Expected number of elements.
        expected: usize,

        /// Given number of elements.
        actual: usize,
    },

    /// A thread panicked while holding the named lock.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl DistrlError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
