//! Environment interaction and transition storage.
use crate::{
    base::{Env, Obs, ObsElem, Policy},
    replay_buffer::SharedReplayBuffer,
    stats::StatsRecorder,
};
use anyhow::Result;
use log::trace;

/// Steps an environment with a policy and stores the transitions.
///
/// The current frame is stored before the action is chosen, so the policy sees the
/// stacked state the transition will be sampled with. An episode ending with a step is
/// reset at the beginning of the next call.
pub struct Sampler<E: Env> {
    env: E,
    prev_obs: Option<E::Obs>,
}

impl<E> Sampler<E>
where
    E: Env,
{
    /// The first call of [`Sampler::sample_and_push`] resets `env`.
    pub fn new(env: E) -> Self {
        Self {
            env,
            prev_obs: None,
        }
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Performs one agent step at agent step index `step`.
    ///
    /// Returns the reward and whether the episode ended.
    pub fn sample_and_push<P: Policy<E>>(
        &mut self,
        policy: &mut P,
        buffer: &SharedReplayBuffer<ObsElem<E>, E::Act>,
        stats: &mut StatsRecorder,
        step: usize,
    ) -> Result<(f32, bool)> {
        let obs = match self.prev_obs.take() {
            Some(obs) => obs,
            None => {
                let obs = self.env.reset()?;
                stats.after_reset();
                trace!("Reset environment at agent step {}", step);
                obs
            }
        };

        let ix = buffer.store_frame(obs.frame())?;
        let state = buffer.encode_recent()?;
        let act = policy.sample(&state, step)?;
        let st = self.env.step(&act)?;
        buffer.store_effect(ix, act, st.reward, st.is_done)?;
        stats.after_step(st.reward, st.is_done);

        if !st.is_done {
            self.prev_obs = Some(st.obs);
        }
        Ok((st.reward, st.is_done))
    }
}
