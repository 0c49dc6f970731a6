//! Agent.
use super::{Env, ObsElem, Policy};
use crate::{record::Record, replay_buffer::TransitionBatch};
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy on an environment.
pub trait Agent<E: Env>: Policy<E> {
    /// Sets the policy to training mode.
    fn train(&mut self);

    /// Sets the policy to evaluation mode.
    fn eval(&mut self);

    /// Returns `true` if it is in training mode.
    fn is_train(&self) -> bool;

    /// Performs one optimization step on a batch sampled at agent step `step`.
    fn opt(&mut self, batch: TransitionBatch<ObsElem<E>, E::Act>, step: usize) -> Result<Record>;

    /// Copies the online parameters into the target network.
    fn sync_target(&mut self) -> Result<()>;

    /// Saves the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;

    /// Returns a handle acting on the same model with its own random source.
    ///
    /// In overlapped execution the collector thread drives the fork while the learner
    /// optimizes the original.
    fn fork(&self, seed: u64) -> Self
    where
        Self: Sized;
}
