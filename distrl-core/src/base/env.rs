//! Environment.
use super::{Info, Obs, Space, Step};
use anyhow::Result;

/// Represents an environment with discrete actions, stepped one transition at a time.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Clone + Default + std::fmt::Debug;

    /// Information in the [`self::Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: u64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment and returns the first observation of an episode.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Performs an environment step.
    fn step(&mut self, a: &Self::Act) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Space of a single observation frame.
    fn observation_space(&self) -> Space;

    /// Space of actions.
    fn action_space(&self) -> Space;
}
