//! Evaluation on a separate environment for a fixed number of agent steps.
use super::Evaluator;
use crate::{
    base::{Agent, Env, Obs, ObsElem},
    record::{Record, RecordValue},
    replay_buffer::{ReplayBuffer, ReplayBufferConfig},
    stats::{StatsMode, StatsRecorder},
};
use anyhow::Result;
use log::info;

/// Runs the agent on its own environment.
///
/// The length of a run is given by the trainer, see
/// [`TrainerConfig::eval`](crate::TrainerConfig::eval). Each run starts from a fresh
/// episode; an episode cut off at the end of the run is discarded. Frames are stacked
/// with a fresh store of `obs_len + 1` slots per run.
pub struct DefaultEvaluator<E: Env> {
    env: E,
    buffer_config: ReplayBufferConfig,
}

impl<E: Env> DefaultEvaluator<E> {
    /// Builds the evaluation environment.
    ///
    /// `buffer_config` is the configuration of the training store, adapted to the
    /// observation space.
    pub fn new(config: &E::Config, seed: u64, buffer_config: &ReplayBufferConfig) -> Result<Self> {
        let buffer_config = buffer_config
            .clone()
            .capacity(buffer_config.obs_len + 1);
        Ok(Self {
            env: E::build(config, seed)?,
            buffer_config,
        })
    }
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<A: Agent<E>>(
        &mut self,
        agent: &mut A,
        stats: &mut StatsRecorder,
        step: usize,
        n_steps: usize,
    ) -> Result<Record> {
        stats.set_mode(StatsMode::Eval);
        let n_episodes_before = stats.eval_episodes();
        let result = self.run(agent, stats, step, n_steps);
        stats.set_mode(StatsMode::Train);
        result?;

        let mean_return = stats.mean_eval_rew_since(n_episodes_before);
        let n_episodes = stats.eval_episodes() - n_episodes_before;
        info!(
            "Evaluation at step {}: {} episodes, mean return {:.3}",
            step, n_episodes, mean_return
        );
        Ok(Record::from_slice(&[
            ("eval/episode_return", RecordValue::Scalar(mean_return)),
            ("eval/run_episodes", RecordValue::Scalar(n_episodes as f32)),
        ]))
    }
}

impl<E: Env> DefaultEvaluator<E> {
    fn run<A: Agent<E>>(
        &mut self,
        agent: &mut A,
        stats: &mut StatsRecorder,
        step: usize,
        n_steps: usize,
    ) -> Result<()> {
        let mut buffer = ReplayBuffer::<ObsElem<E>, E::Act>::build(&self.buffer_config)?;
        let mut prev_obs: Option<E::Obs> = None;
        for _ in 0..n_steps {
            let obs = match prev_obs.take() {
                Some(obs) => obs,
                None => {
                    stats.after_reset();
                    self.env.reset()?
                }
            };
            let ix = buffer.store_frame(obs.frame())?;
            let state = buffer.encode_recent();
            let act = agent.sample(&state, step)?;
            let st = self.env.step(&act)?;
            buffer.store_effect(ix, act, st.reward, st.is_done);
            stats.after_step(st.reward, st.is_done);
            if !st.is_done {
                prev_obs = Some(st.obs);
            }
        }
        Ok(())
    }
}
