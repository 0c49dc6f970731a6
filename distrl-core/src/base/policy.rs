//! Policy.
use super::{Env, ObsElem};
use anyhow::Result;

/// A policy on an environment.
///
/// A policy maps a stacked state, the concatenation of the most recent `obs_len` frames,
/// to an action. `step` is the agent step the action is taken at.
pub trait Policy<E: Env> {
    /// Samples an action given a stacked state.
    fn sample(&mut self, state: &[ObsElem<E>], step: usize) -> Result<E::Act>;
}
