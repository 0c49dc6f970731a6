//! Evaluate [`Agent`].
use crate::{
    base::{Agent, Env},
    record::Record,
    stats::StatsRecorder,
};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluates an agent.
///
/// The trainer switches the agent to evaluation mode before calling
/// [`Evaluator::evaluate`] and back to training mode afterwards.
pub trait Evaluator<E: Env> {
    /// Runs an evaluation of `n_steps` agent steps at agent step `step` and returns
    /// its results.
    fn evaluate<A: Agent<E>>(
        &mut self,
        agent: &mut A,
        stats: &mut StatsRecorder,
        step: usize,
        n_steps: usize,
    ) -> Result<Record>;
}
