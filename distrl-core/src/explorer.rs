//! Epsilon-greedy exploration.
use crate::schedule::Schedule;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer.
///
/// With probability `epsilon` a uniformly random action is taken, otherwise the greedy
/// action of the network. In training `epsilon` follows `schedule` over agent steps;
/// in evaluation it is fixed to `epsilon_eval`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Epsilon in training.
    pub schedule: Schedule,
    /// Epsilon in evaluation.
    pub epsilon_eval: f64,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            schedule: Schedule::linear(1.0, 0.01, 1_000_000),
            epsilon_eval: 0.001,
        }
    }
}

impl EpsilonGreedy {
    /// Explorer with the given training schedule and the default `epsilon_eval`.
    pub fn new(schedule: Schedule) -> Self {
        Self {
            schedule,
            ..Default::default()
        }
    }

    /// Sets the exploration probability in evaluation.
    pub fn epsilon_eval(mut self, v: f64) -> Self {
        self.epsilon_eval = v;
        self
    }

    /// Exploration probability at agent step `step`.
    pub fn epsilon(&self, step: usize, train: bool) -> f64 {
        if train {
            self.schedule.value(step)
        } else {
            self.epsilon_eval
        }
    }

    /// Selects an action.
    ///
    /// `greedy` queries the network and is evaluated only if the greedy branch is taken.
    /// `random` samples the action space.
    pub fn select_action<R, G, S>(
        &self,
        step: usize,
        train: bool,
        rng: &mut R,
        greedy: G,
        random: S,
    ) -> Result<usize>
    where
        R: Rng + ?Sized,
        G: FnOnce(&mut R) -> Result<usize>,
        S: FnOnce(&mut R) -> usize,
    {
        let epsilon = self.epsilon(step, train);
        if rng.gen::<f64>() < epsilon {
            Ok(random(rng))
        } else {
            greedy(rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_epsilon_one_is_uniform() {
        let explorer = EpsilonGreedy::new(Schedule::constant(1.0));
        let mut rng = StdRng::seed_from_u64(42);
        let mut counts = [0usize; 4];
        for step in 0..4000 {
            let a = explorer
                .select_action(
                    step,
                    true,
                    &mut rng,
                    |_| panic!("greedy branch must not be evaluated"),
                    |rng| rng.gen_range(0..4),
                )
                .unwrap();
            counts[a] += 1;
        }
        for c in counts {
            assert!((850..1150).contains(&c), "{:?}", counts);
        }
    }

    #[test]
    fn test_epsilon_zero_is_greedy() {
        let explorer = EpsilonGreedy::new(Schedule::constant(0.0));
        let mut rng = StdRng::seed_from_u64(0);
        for step in 0..1000 {
            let a = explorer
                .select_action(step, true, &mut rng, |_| Ok(2), |_| 0)
                .unwrap();
            assert_eq!(a, 2);
        }
    }

    #[test]
    fn test_eval_uses_epsilon_eval() {
        let explorer = EpsilonGreedy::new(Schedule::constant(1.0)).epsilon_eval(0.0);
        assert_eq!(explorer.epsilon(0, false), 0.0);
        assert_eq!(explorer.epsilon(0, true), 1.0);
        let mut rng = StdRng::seed_from_u64(0);
        let a = explorer
            .select_action(0, false, &mut rng, |_| Ok(1), |_| 0)
            .unwrap();
        assert_eq!(a, 1);
    }
}
