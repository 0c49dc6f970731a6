use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Requests a running [`Trainer`](super::Trainer) to stop.
///
/// Loops finish the environment or optimization step in flight, then exit.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// A handle with no stop requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the stop. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once a stop is requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
