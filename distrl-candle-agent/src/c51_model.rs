//! Online and target networks of a categorical distributional agent.
use crate::{
    model::SubModel,
    opt::{Optimizer, OptimizerConfig},
    util::{track, OutDim},
    Device,
};
use anyhow::{bail, Context, Result};
use candle_core::{DType, Tensor, D};
use candle_nn::{
    ops::{log_softmax, softmax},
    VarBuilder, VarMap,
};
use distrl_core::{
    distributional::{DistributionalModel, Distributions},
    error::DistrlError,
};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

const ONLINE_FILE: &str = "c51_model.safetensors";
const TARGET_FILE: &str = "c51_model_tgt.safetensors";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`C51Model`].
pub struct C51ModelConfig<Q> {
    pub q_config: Option<Q>,
    pub n_actions: usize,
    pub n_atoms: usize,
    pub opt_config: OptimizerConfig,
    #[serde(default)]
    pub device: Device,
}

impl<Q> Default for C51ModelConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            n_actions: 0,
            n_atoms: 51,
            opt_config: OptimizerConfig::Adam {
                lr: 0.00025,
                eps: 0.01 / 32.0,
            },
            device: Device::Cpu,
        }
    }
}

impl<Q> C51ModelConfig<Q>
where
    Q: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the network. Its output dimension is overwritten with
    /// `n_actions * n_atoms` on build.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    pub fn n_atoms(mut self, v: usize) -> Self {
        self.n_atoms = v;
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`C51ModelConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`C51ModelConfig`] to as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Distributional network of `n_actions * n_atoms` logits with a target copy.
///
/// Each group of `n_atoms` logits is normalized with softmax into the value
/// distribution of one action.
pub struct C51Model<Q: SubModel> {
    device: candle_core::Device,
    n_actions: usize,
    n_atoms: usize,
    varmap: VarMap,
    varmap_tgt: VarMap,
    q: Q,
    q_tgt: Q,
    opt: Optimizer,
}

impl<Q> C51Model<Q>
where
    Q: SubModel,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`C51Model`]. The target network starts as a copy of the online one.
    pub fn build(config: C51ModelConfig<Q::Config>) -> Result<Self> {
        if config.n_actions == 0 || config.n_atoms < 2 {
            bail!(
                "invalid model dimensions: {} actions, {} atoms",
                config.n_actions,
                config.n_atoms
            );
        }
        let mut q_config = config.q_config.context("q_config is not set.")?;
        q_config.set_out_dim(config.n_actions * config.n_atoms);
        let device: candle_core::Device = config.device.try_into()?;

        let varmap = VarMap::new();
        let q = Q::build(
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
            q_config.clone(),
        )?;
        let varmap_tgt = VarMap::new();
        let q_tgt = Q::build(
            VarBuilder::from_varmap(&varmap_tgt, DType::F32, &device),
            q_config,
        )?;
        track(&varmap_tgt, &varmap, 1.0)?;
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            device,
            n_actions: config.n_actions,
            n_atoms: config.n_atoms,
            varmap,
            varmap_tgt,
            q,
            q_tgt,
            opt,
        })
    }

    fn states(&self, states: &[f32], batch_size: usize) -> Result<Tensor> {
        if batch_size == 0 || states.len() % batch_size != 0 {
            return Err(DistrlError::ShapeMismatch {
                expected: batch_size,
                actual: states.len(),
            }
            .into());
        }
        let state_len = states.len() / batch_size;
        Ok(Tensor::from_slice(states, (batch_size, state_len), &self.device)?)
    }

    /// Logits of shape `[batch_size, n_actions, n_atoms]`.
    fn logits(&self, q: &Q, states: &Tensor) -> Result<Tensor> {
        let batch_size = states.dims()[0];
        let xs = q.forward(states)?;
        Ok(xs.reshape((batch_size, self.n_actions, self.n_atoms))?)
    }

    fn distributions(&self, q: &Q, states: &[f32], batch_size: usize) -> Result<Distributions> {
        let xs = self.states(states, batch_size)?;
        let probs = softmax(&self.logits(q, &xs)?, D::Minus1)?;
        let probs = probs.flatten_all()?.to_vec1::<f32>()?;
        Ok(Distributions::new(
            probs,
            batch_size,
            self.n_actions,
            self.n_atoms,
        )?)
    }
}

impl<Q> DistributionalModel for C51Model<Q>
where
    Q: SubModel,
    Q::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    fn n_actions(&self) -> usize {
        self.n_actions
    }

    fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    fn forward(&self, states: &[f32], batch_size: usize) -> Result<Distributions> {
        self.distributions(&self.q, states, batch_size)
    }

    fn forward_target(&self, states: &[f32], batch_size: usize) -> Result<Distributions> {
        self.distributions(&self.q_tgt, states, batch_size)
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
        if target.len() != batch_size * n {
            return Err(DistrlError::ShapeMismatch {
                expected: batch_size * n,
                actual: target.len(),
            }
            .into());
        }
        let xs = self.states(states, batch_size)?;
        let target = Tensor::from_slice(target, (batch_size, n), &self.device)?;
        let ix = {
            let ix = actions.iter().map(|&a| a as u32).collect::<Vec<_>>();
            Tensor::from_vec(ix, (batch_size, 1, 1), &self.device)?
                .broadcast_as((batch_size, 1, n))?
                .contiguous()?
        };

        // Cross-entropy between the projected target and the taken action's distribution.
        let log_p = log_softmax(&self.logits(&self.q, &xs)?, D::Minus1)?;
        let log_p = log_p.gather(&ix, 1)?.squeeze(1)?;
        let loss = (target * log_p)?.sum(D::Minus1)?.neg()?.mean_all()?;

        self.opt.set_learning_rate(lr);
        self.opt.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    fn sync_target(&mut self) -> Result<()> {
        track(&self.varmap_tgt, &self.varmap, 1.0)
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.varmap.save(path.join(ONLINE_FILE))?;
        self.varmap_tgt.save(path.join(TARGET_FILE))?;
        info!("Save c51 model to {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.varmap.load(path.join(ONLINE_FILE))?;
        self.varmap_tgt.load(path.join(TARGET_FILE))?;
        info!("Load c51 model from {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::{Mlp, MlpConfig};
    use tempdir::TempDir;

    const N_ACTIONS: usize = 2;
    const N_ATOMS: usize = 5;

    fn model() -> Result<C51Model<Mlp>> {
        let config = C51ModelConfig::default()
            .q_config(MlpConfig::new(3, vec![16], 0))
            .n_actions(N_ACTIONS)
            .n_atoms(N_ATOMS)
            .opt_config(OptimizerConfig::Adam { lr: 0.01, eps: 1e-8 });
        C51Model::build(config)
    }

    #[test]
    fn test_forward_is_normalized() -> Result<()> {
        let model = model()?;
        let dists = model.forward(&[0.1, 0.2, 0.3, 1.0, 0.0, -1.0], 2)?;
        assert_eq!(dists.batch_size(), 2);
        for b in 0..2 {
            for a in 0..N_ACTIONS {
                let sum: f32 = dists.get(b, a).iter().sum();
                assert!((sum - 1.0).abs() < 1e-5);
            }
        }
        // The target starts as a copy.
        assert_eq!(dists, model.forward_target(&[0.1, 0.2, 0.3, 1.0, 0.0, -1.0], 2)?);
        Ok(())
    }

    #[test]
    fn test_train_step_reduces_loss() -> Result<()> {
        let mut model = model()?;
        let states = [0.5, -0.5, 1.0, 0.5, -0.5, 1.0];
        let actions = [1, 1];
        let target = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let first = model.train_step(&states, &actions, &target, 0.05)?;
        let mut last = first;
        for _ in 0..100 {
            last = model.train_step(&states, &actions, &target, 0.05)?;
        }
        assert!(last < first);
        assert!(model.forward(&states, 2)?.get(0, 1)[4] > 0.5);

        // The target network is untouched until synced.
        let tgt = model.forward_target(&states, 2)?;
        assert!(tgt.get(0, 1)[4] < 0.5);
        model.sync_target()?;
        assert_eq!(model.forward(&states, 2)?, model.forward_target(&states, 2)?);
        Ok(())
    }

    #[test]
    fn test_shape_mismatch() -> Result<()> {
        let mut model = model()?;
        assert!(model.forward(&[0.0; 5], 2).is_err());
        assert!(model.train_step(&[0.0; 3], &[0], &[0.2; 4], 0.01).is_err());
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let mut model = model()?;
        model.train_step(&[1.0, 0.0, 0.0], &[0], &[1.0, 0.0, 0.0, 0.0, 0.0], 0.1)?;
        let dir = TempDir::new("c51_model")?;
        model.save_params(dir.path())?;

        let mut other = self::model()?;
        other.load_params(dir.path())?;
        let states = [0.3, 0.2, 0.1];
        assert_eq!(model.forward(&states, 1)?, other.forward(&states, 1)?);
        assert_eq!(model.forward_target(&states, 1)?, other.forward_target(&states, 1)?);
        Ok(())
    }
}
