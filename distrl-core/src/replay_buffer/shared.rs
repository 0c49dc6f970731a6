//! Replay buffer shared by a collector and a learner.
use super::{ReplayBuffer, TransitionBatch};
use crate::{base::FrameElem, error::DistrlError};
use std::sync::{Arc, Mutex, MutexGuard};

/// [`ReplayBuffer`] behind a mutex.
///
/// Every call runs under the lock, so a reader never observes a half-written transition
/// and a sampled batch comes from a single state of the store. The learner does not
/// wait on the store itself: it waits for training ticks, which are issued only after
/// the collector stored the transitions of the tick.
pub struct SharedReplayBuffer<T, A> {
    buffer: Arc<Mutex<ReplayBuffer<T, A>>>,
}

impl<T, A> Clone for SharedReplayBuffer<T, A> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
        }
    }
}

impl<T, A> SharedReplayBuffer<T, A>
where
    T: FrameElem,
    A: Clone + Default,
{
    /// Wraps a store.
    pub fn new(buffer: ReplayBuffer<T, A>) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(buffer)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ReplayBuffer<T, A>>, DistrlError> {
        self.buffer
            .lock()
            .map_err(|_| DistrlError::LockPoisoned("replay buffer"))
    }

    /// Number of stored frames.
    pub fn len(&self) -> Result<usize, DistrlError> {
        Ok(self.lock()?.len())
    }

    /// Number of frames in a stacked state.
    pub fn obs_len(&self) -> Result<usize, DistrlError> {
        Ok(self.lock()?.obs_len())
    }

    /// See [`ReplayBuffer::store_frame`].
    pub fn store_frame(&self, frame: &[T]) -> Result<usize, DistrlError> {
        self.lock()?.store_frame(frame)
    }

    /// See [`ReplayBuffer::store_effect`].
    pub fn store_effect(
        &self,
        ix: usize,
        act: A,
        reward: f32,
        is_done: bool,
    ) -> Result<(), DistrlError> {
        self.lock()?.store_effect(ix, act, reward, is_done);
        Ok(())
    }

    /// See [`ReplayBuffer::store`].
    pub fn store(&self, frame: &[T], act: A, reward: f32, is_done: bool) -> Result<usize, DistrlError> {
        self.lock()?.store(frame, act, reward, is_done)
    }

    /// See [`ReplayBuffer::encode_recent`].
    pub fn encode_recent(&self) -> Result<Vec<T>, DistrlError> {
        Ok(self.lock()?.encode_recent())
    }

    /// See [`ReplayBuffer::sample`].
    pub fn sample(&self, batch_size: usize) -> Result<TransitionBatch<T, A>, DistrlError> {
        self.lock()?.sample(batch_size)
    }
}
