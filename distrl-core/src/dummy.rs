//! Deterministic environment and table-free model used in tests.
use crate::{
    base::{Env, Space, Step},
    distributional::{DistributionalModel, Distributions},
    error::DistrlError,
};
use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Configuration of [`ChainEnv`].
#[derive(Debug, Clone)]
pub struct ChainEnvConfig {
    /// Number of states on the chain.
    pub n_states: usize,

    /// Episode length limit.
    pub max_len: usize,

    /// Observe a `[1, 1, n_states]` image instead of a vector.
    pub image: bool,

    /// Fail on this environment step, counted over the lifetime of the environment.
    pub fail_at_step: Option<usize>,
}

impl Default for ChainEnvConfig {
    fn default() -> Self {
        Self {
            n_states: 5,
            max_len: 10,
            image: false,
            fail_at_step: None,
        }
    }
}

/// A chain of states. Action 1 moves right, action 0 moves left.
///
/// Reaching the right end gives reward 1 and ends the episode. The observation is the
/// one-hot encoding of the position.
pub struct ChainEnv {
    config: ChainEnvConfig,
    pos: usize,
    t: usize,
    total_steps: usize,
}

impl ChainEnv {
    fn obs(&self) -> Vec<f32> {
        let mut obs = vec![0.0; self.config.n_states];
        obs[self.pos] = 1.0;
        obs
    }
}

impl Env for ChainEnv {
    type Config = ChainEnvConfig;
    type Obs = Vec<f32>;
    type Act = usize;
    type Info = ();

    fn build(config: &Self::Config, _seed: u64) -> Result<Self> {
        if config.n_states < 2 {
            bail!("chain needs at least 2 states");
        }
        Ok(Self {
            config: config.clone(),
            pos: 0,
            t: 0,
            total_steps: 0,
        })
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.pos = 0;
        self.t = 0;
        Ok(self.obs())
    }

    fn step(&mut self, a: &usize) -> Result<Step<Self>> {
        self.total_steps += 1;
        if Some(self.total_steps) == self.config.fail_at_step {
            bail!("chain environment failed at step {}", self.total_steps);
        }
        self.pos = match a {
            0 => self.pos.saturating_sub(1),
            1 => (self.pos + 1).min(self.config.n_states - 1),
            _ => bail!("invalid action {}", a),
        };
        self.t += 1;
        let goal = self.pos == self.config.n_states - 1;
        let reward = if goal { 1.0 } else { 0.0 };
        let is_done = goal || self.t >= self.config.max_len;
        Ok(Step::new(self.obs(), *a, reward, is_done, ()))
    }

    fn observation_space(&self) -> Space {
        let shape = if self.config.image {
            vec![1, 1, self.config.n_states]
        } else {
            vec![self.config.n_states]
        };
        Space::Box { shape }
    }

    fn action_space(&self) -> Space {
        Space::Discrete(2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Params {
    w: Vec<f32>,
    b: Vec<f32>,
}

/// Linear map from states to per-action logits over atoms, trained with plain
/// gradient descent.
#[derive(Debug)]
pub struct LinearModel {
    in_dim: usize,
    n_actions: usize,
    n_atoms: usize,
    online: Params,
    target: Params,
    n_syncs: usize,
}

impl LinearModel {
    /// Random initial parameters, identical in the online and the target copy.
    pub fn new(in_dim: usize, n_actions: usize, n_atoms: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_out = n_actions * n_atoms;
        let online = Params {
            w: (0..n_out * in_dim)
                .map(|_| rng.gen_range(-0.01..0.01))
                .collect(),
            b: vec![0.0; n_out],
        };
        Self {
            in_dim,
            n_actions,
            n_atoms,
            target: online.clone(),
            online,
            n_syncs: 0,
        }
    }

    /// Overwrites the online bias of action `a`.
    pub fn set_bias(&mut self, a: usize, logits: &[f32]) {
        let n = self.n_atoms;
        self.online.b[a * n..(a + 1) * n].copy_from_slice(logits);
    }

    /// Number of target synchronizations.
    pub fn n_syncs(&self) -> usize {
        self.n_syncs
    }

    fn check_states(&self, states: &[f32], batch_size: usize) -> Result<(), DistrlError> {
        if states.len() != batch_size * self.in_dim {
            return Err(DistrlError::ShapeMismatch {
                expected: batch_size * self.in_dim,
                actual: states.len(),
            });
        }
        Ok(())
    }

    /// Softmax over atoms of the logits of action `a` for input `x`.
    fn probs(&self, params: &Params, x: &[f32], a: usize) -> Vec<f32> {
        let n = self.n_atoms;
        let logits: Vec<f32> = (a * n..(a + 1) * n)
            .map(|o| {
                let w = &params.w[o * self.in_dim..(o + 1) * self.in_dim];
                params.b[o] + w.iter().zip(x).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect();
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exp: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f32 = exp.iter().sum();
        exp.into_iter().map(|e| e / sum).collect()
    }

    fn dists(&self, params: &Params, states: &[f32], batch_size: usize) -> Result<Distributions> {
        self.check_states(states, batch_size)?;
        let mut probs = Vec::with_capacity(batch_size * self.n_actions * self.n_atoms);
        for x in states.chunks(self.in_dim) {
            for a in 0..self.n_actions {
                probs.extend(self.probs(params, x, a));
            }
        }
        Ok(Distributions::new(
            probs,
            batch_size,
            self.n_actions,
            self.n_atoms,
        )?)
    }
}

impl DistributionalModel for LinearModel {
    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn forward(&self, states: &[f32], batch_size: usize) -> Result<Distributions> {
        self.dists(&self.online, states, batch_size)
    }

    fn forward_target(&self, states: &[f32], batch_size: usize) -> Result<Distributions> {
        self.dists(&self.target, states, batch_size)
    }

    fn train_step(
        &mut self,
        states: &[f32],
        actions: &[usize],
        target: &[f32],
        lr: f64,
    ) -> Result<f32> {
        let batch_size = actions.len();
        let n = self.n_atoms;
        self.check_states(states, batch_size)?;
        if target.len() != batch_size * n {
            return Err(DistrlError::ShapeMismatch {
                expected: batch_size * n,
                actual: target.len(),
            }
            .into());
        }

        let mut gw = vec![0f32; self.online.w.len()];
        let mut gb = vec![0f32; self.online.b.len()];
        let mut loss = 0f32;
        let scale = 1.0 / batch_size as f32;
        for (i, (x, &a)) in states.chunks(self.in_dim).zip(actions).enumerate() {
            let z = self.probs(&self.online, x, a);
            let t = &target[i * n..(i + 1) * n];
            for k in 0..n {
                loss -= t[k] * z[k].max(1e-8).ln() * scale;
                // Gradient of the cross-entropy with respect to the logit.
                let g = (z[k] - t[k]) * scale;
                let o = a * n + k;
                gb[o] += g;
                for (j, xj) in x.iter().enumerate() {
                    gw[o * self.in_dim + j] += g * xj;
                }
            }
        }

        let lr = lr as f32;
        for (w, g) in self.online.w.iter_mut().zip(gw) {
            *w -= lr * g;
        }
        for (b, g) in self.online.b.iter_mut().zip(gb) {
            *b -= lr * g;
        }
        Ok(loss)
    }

    fn sync_target(&mut self) -> Result<()> {
        self.target = self.online.clone();
        self.n_syncs += 1;
        Ok(())
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let json = serde_json::to_string(&(&self.online, &self.target))?;
        fs::write(path.join("linear_model.json"), json)?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let json = fs::read_to_string(path.join("linear_model.json"))?;
        let (online, target): (Params, Params) = serde_json::from_str(&json)?;
        if online.b.len() != self.online.b.len() || online.w.len() != self.online.w.len() {
            bail!("parameters in {:?} do not match the model", path);
        }
        self.online = online;
        self.target = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_env() -> Result<()> {
        let mut env = ChainEnv::build(&ChainEnvConfig::default(), 0)?;
        assert_eq!(env.reset()?, vec![1.0, 0.0, 0.0, 0.0, 0.0]);
        for _ in 0..3 {
            let st = env.step(&1)?;
            assert!(!st.is_done);
            assert_eq!(st.reward, 0.0);
        }
        let st = env.step(&1)?;
        assert!(st.is_done);
        assert_eq!(st.reward, 1.0);
        assert!(env.step(&2).is_err());
        Ok(())
    }

    #[test]
    fn test_sync_target() -> Result<()> {
        let mut model = LinearModel::new(2, 2, 3, 0);
        model.set_bias(0, &[5.0, 0.0, 0.0]);
        let x = [1.0, 0.0];
        assert_ne!(model.forward(&x, 1)?, model.forward_target(&x, 1)?);
        model.sync_target()?;
        assert_eq!(model.forward(&x, 1)?, model.forward_target(&x, 1)?);
        Ok(())
    }
}
