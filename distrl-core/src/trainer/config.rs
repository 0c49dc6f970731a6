//! Configuration of [`Trainer`](super::Trainer).
use crate::error::DistrlError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// How collection and optimization are scheduled.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy, Default)]
pub enum ExecutionMode {
    /// One thread alternates environment steps and optimization steps.
    #[default]
    Sequential,

    /// A collector thread and a learner thread run concurrently.
    Overlapped,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::Overlapped => f.write_str("overlapped"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = DistrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "overlapped" | "parallel" => Ok(Self::Overlapped),
            _ => Err(DistrlError::config(format!("unknown execution mode '{}'", s))),
        }
    }
}

/// Configuration of [`Trainer`](super::Trainer).
///
/// Frequencies are counted in agent steps, i.e., environment steps of the training
/// environment.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// Number of agent steps to run.
    pub max_steps: usize,

    /// Agent steps before the first optimization step.
    pub warm_up: usize,

    /// Interval of optimization steps.
    pub train_freq: usize,

    /// Interval of target network synchronization.
    pub update_target_freq: usize,

    /// Number of transitions in an optimization step.
    pub batch_size: usize,

    /// Interval of evaluation runs. `0` disables evaluation.
    pub eval_freq: usize,

    /// Agent steps of an evaluation run.
    pub eval_len: usize,

    /// Interval of writing records.
    pub log_freq: usize,

    /// Interval of saving model parameters. `0` disables intermediate checkpoints.
    pub save_freq: usize,

    /// Where checkpoints are saved.
    pub model_dir: Option<PathBuf>,

    /// Where run statistics are saved.
    pub stats_dir: Option<PathBuf>,

    /// How collection and optimization are scheduled.
    pub mode: ExecutionMode,

    /// Seed of the collector fork in overlapped execution.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 0,
            warm_up: 50_000,
            train_freq: 4,
            update_target_freq: 10_000,
            batch_size: 32,
            eval_freq: 0,
            eval_len: 125_000,
            log_freq: 10_000,
            save_freq: 0,
            model_dir: None,
            stats_dir: None,
            mode: ExecutionMode::Sequential,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of agent steps.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the warm-up period in agent steps.
    pub fn warm_up(mut self, v: usize) -> Self {
        self.warm_up = v;
        self
    }

    /// Sets the interval of optimization steps.
    pub fn train_freq(mut self, v: usize) -> Self {
        self.train_freq = v;
        self
    }

    /// Sets the interval of target network synchronization.
    pub fn update_target_freq(mut self, v: usize) -> Self {
        self.update_target_freq = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the interval and the length of evaluation runs.
    pub fn eval(mut self, eval_freq: usize, eval_len: usize) -> Self {
        self.eval_freq = eval_freq;
        self.eval_len = eval_len;
        self
    }

    /// Sets the interval of writing records.
    pub fn log_freq(mut self, v: usize) -> Self {
        self.log_freq = v;
        self
    }

    /// Sets the interval of saving model parameters.
    pub fn save_freq(mut self, v: usize) -> Self {
        self.save_freq = v;
        self
    }

    /// Sets the directory where model parameters are saved.
    pub fn model_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(v.into());
        self
    }

    /// Sets the directory where run statistics are saved.
    pub fn stats_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.stats_dir = Some(v.into());
        self
    }

    /// Sets the execution mode.
    pub fn mode(mut self, v: ExecutionMode) -> Self {
        self.mode = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks that frequencies and sizes are usable.
    pub fn validate(&self) -> Result<(), DistrlError> {
        let positive = [
            ("train_freq", self.train_freq),
            ("update_target_freq", self.update_target_freq),
            ("batch_size", self.batch_size),
            ("log_freq", self.log_freq),
        ];
        for (name, v) in positive {
            if v == 0 {
                return Err(DistrlError::config(format!("{} must be positive", name)));
            }
        }
        if self.eval_freq > 0 && self.eval_len == 0 {
            return Err(DistrlError::config("eval_len must be positive when evaluating"));
        }
        Ok(())
    }

    /// Loads [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_trainer_config() -> Result<()> {
        let config = TrainerConfig::default()
            .max_steps(100)
            .eval(1000, 100)
            .model_dir("some/directory")
            .mode(ExecutionMode::Overlapped);

        let dir = TempDir::new("trainer_config")?;
        let path = dir.path().join("trainer_config.yaml");
        config.save(&path)?;
        let config_ = TrainerConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(TrainerConfig::default().validate().is_ok());
        assert!(TrainerConfig::default().train_freq(0).validate().is_err());
        assert!(TrainerConfig::default()
            .update_target_freq(0)
            .validate()
            .is_err());
        assert!(TrainerConfig::default().eval(10, 0).validate().is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(
            "Overlapped".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Overlapped
        );
        assert_eq!(
            "sequential".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Sequential
        );
        assert!("async".parse::<ExecutionMode>().is_err());
    }
}
