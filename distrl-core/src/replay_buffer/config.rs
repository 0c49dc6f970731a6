//! Configuration of [`ReplayBuffer`](super::ReplayBuffer).
use crate::{base::Space, error::DistrlError};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayBuffer`](super::ReplayBuffer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayBufferConfig {
    /// Maximum number of stored frames.
    pub capacity: usize,

    /// Number of frames in a stacked state.
    pub obs_len: usize,

    /// Number of elements in a single frame.
    pub frame_len: usize,

    /// Seed of sampling.
    pub seed: u64,
}

impl Default for ReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            obs_len: 4,
            frame_len: 1,
            seed: 42,
        }
    }
}

impl ReplayBufferConfig {
    /// Sets the capacity of the replay buffer.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the number of stacked frames.
    pub fn obs_len(mut self, obs_len: usize) -> Self {
        self.obs_len = obs_len;
        self
    }

    /// Sets the number of elements in a frame.
    pub fn frame_len(mut self, frame_len: usize) -> Self {
        self.frame_len = frame_len;
        self
    }

    /// Sets the random seed used for sampling.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Adapts the configuration to an observation space.
    ///
    /// Frame stacking applies to image observations (3-dimensional `Box` spaces).
    /// Any other `Box` observation uses a single frame.
    pub fn for_observation_space(self, space: &Space) -> Result<Self, DistrlError> {
        let shape = space.box_shape()?;
        let obs_len = if shape.len() == 3 { self.obs_len } else { 1 };
        Ok(self.frame_len(space.flat_dim()).obs_len(obs_len))
    }

    /// Number of elements in a stacked state.
    pub fn state_len(&self) -> usize {
        self.obs_len * self.frame_len
    }

    pub(super) fn validate(&self) -> Result<(), DistrlError> {
        if self.capacity == 0 {
            return Err(DistrlError::config("capacity must be positive"));
        }
        if self.obs_len == 0 {
            return Err(DistrlError::config("obs_len must be positive"));
        }
        if self.frame_len == 0 {
            return Err(DistrlError::config("frame_len must be positive"));
        }
        if self.capacity <= self.obs_len {
            return Err(DistrlError::config(format!(
                "capacity ({}) must exceed obs_len ({})",
                self.capacity, self.obs_len
            )));
        }
        Ok(())
    }

    /// Loads [`ReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayBufferConfig`] as YAML file.
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
    fn test_obs_len_for_vector_observation() {
        let config = ReplayBufferConfig::default().obs_len(4);
        let vector = config
            .clone()
            .for_observation_space(&Space::Box { shape: vec![8] })
            .unwrap();
        assert_eq!(vector.obs_len, 1);
        assert_eq!(vector.frame_len, 8);

        let image = config
            .clone()
            .for_observation_space(&Space::Box {
                shape: vec![1, 84, 84],
            })
            .unwrap();
        assert_eq!(image.obs_len, 4);
        assert_eq!(image.frame_len, 84 * 84);

        assert!(config.for_observation_space(&Space::Discrete(3)).is_err());
    }

    #[test]
    fn test_serde_replay_buffer_config() -> Result<()> {
        let config = ReplayBufferConfig::default().capacity(100).obs_len(2);
        let dir = TempDir::new("replay_buffer_config")?;
        let path = dir.path().join("replay_buffer_config.yaml");
        config.save(&path)?;
        assert_eq!(ReplayBufferConfig::load(&path)?, config);
        Ok(())
    }
}
