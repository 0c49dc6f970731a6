//! Configuration of [`C51`](super::C51) agent.
use crate::{
    distributional::{SupportConfig, Variant},
    explorer::EpsilonGreedy,
    schedule::Schedule,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`C51`](super::C51) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct C51Config {
    /// Atoms of the value distributions.
    pub support: SupportConfig,
    /// Variant of action selection and bootstrapping.
    pub variant: Variant,
    /// Discount factor of the Bellman target.
    pub discount_factor: f32,
    /// Exploration in training and evaluation.
    pub explorer: EpsilonGreedy,

    /// Learning rate over agent steps.
    pub lr_schedule: Schedule,

    /// Seed of action sampling.
    pub seed: u64,
}

impl Default for C51Config {
    fn default() -> Self {
        Self {
            support: SupportConfig::default(),
            variant: Variant::C51,
            discount_factor: 0.99,
            explorer: EpsilonGreedy::default(),
            lr_schedule: Schedule::constant(0.00025),
            seed: 42,
        }
    }
}

impl C51Config {
    /// Sets the value range and the number of atoms.
    pub fn support(mut self, v_min: f32, v_max: f32, n_atoms: usize) -> Self {
        self.support = SupportConfig {
            v_min,
            v_max,
            n_atoms,
        };
        self
    }

    /// Sets the variant.
    pub fn variant(mut self, v: Variant) -> Self {
        self.variant = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f32) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the explorer.
    pub fn explorer(mut self, v: EpsilonGreedy) -> Self {
        self.explorer = v;
        self
    }

    /// Sets the learning rate schedule.
    pub fn lr_schedule(mut self, v: Schedule) -> Self {
        self.lr_schedule = v;
        self
    }

    /// Sets the seed of action sampling.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Loads [`C51Config`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`C51Config`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
