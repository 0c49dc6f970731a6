//! Batch of transitions sampled from [`ReplayBuffer`](super::ReplayBuffer).

/// Transitions `(s_t, a_t, r_t, done_t, s_t+1)` with flattened stacked states.
///
/// `obs` and `next_obs` hold `len()` states of `state_len` elements each, in row-major
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionBatch<T, A> {
    /// Stacked states the actions were taken on.
    pub obs: Vec<T>,
    /// Actions taken.
    pub act: Vec<A>,
    /// Stacked states after the actions.
    pub next_obs: Vec<T>,
    /// Rewards received.
    pub reward: Vec<f32>,
    /// `true` if the episode ended with the transition.
    pub is_done: Vec<bool>,

    /// Logical store positions the transitions were taken from.
    pub ix_sample: Vec<usize>,

    /// Number of elements in a stacked state.
    pub state_len: usize,
}

impl<T, A> TransitionBatch<T, A> {
    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns `true` if the batch holds no transition.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }

    /// Unpacks the batch into `(obs, act, next_obs, reward, is_done)`.
    #[allow(clippy::type_complexity)]
    pub fn unpack(self) -> (Vec<T>, Vec<A>, Vec<T>, Vec<f32>, Vec<bool>) {
        (self.obs, self.act, self.next_obs, self.reward, self.is_done)
    }

    /// Stacked state of the `i`-th transition.
    pub fn state(&self, i: usize) -> &[T] {
        &self.obs[i * self.state_len..(i + 1) * self.state_len]
    }

    /// Stacked next state of the `i`-th transition.
    pub fn next_state(&self, i: usize) -> &[T] {
        &self.next_obs[i * self.state_len..(i + 1) * self.state_len]
    }
}
