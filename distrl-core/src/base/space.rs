use crate::error::DistrlError;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Observation or action space of an environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    /// Real- or integer-valued array with the given shape.
    Box {
        /// Array shape, outermost dimension first.
        shape: Vec<usize>,
    },

    /// `n` discrete actions `0..n`.
    Discrete(usize),
}

impl Space {
    /// Shape of a `Box` space.
    pub fn box_shape(&self) -> Result<&[usize], DistrlError> {
        match self {
            Self::Box { shape } => Ok(shape),
            _ => Err(DistrlError::config(format!(
                "observation space must be Box, got {:?}",
                self
            ))),
        }
    }

    /// Number of actions of a `Discrete` space.
    pub fn discrete_n(&self) -> Result<usize, DistrlError> {
        match self {
            Self::Discrete(n) if *n > 0 => Ok(*n),
            _ => Err(DistrlError::config(format!(
                "action space must be non-empty Discrete, got {:?}",
                self
            ))),
        }
    }

    /// Number of scalar elements in a sample of the space.
    pub fn flat_dim(&self) -> usize {
        match self {
            Self::Box { shape } => shape.iter().product(),
            Self::Discrete(_) => 1,
        }
    }

    /// Uniform sample of a `Discrete` space.
    pub fn sample_discrete<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, DistrlError> {
        let n = self.discrete_n()?;
        Ok(rng.gen_range(0..n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_space_kinds() {
        let obs = Space::Box {
            shape: vec![84, 84],
        };
        assert_eq!(obs.box_shape().unwrap(), &[84, 84]);
        assert_eq!(obs.flat_dim(), 84 * 84);
        assert!(obs.discrete_n().is_err());

        let act = Space::Discrete(4);
        assert!(act.box_shape().is_err());
        assert!(Space::Discrete(0).discrete_n().is_err());

        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert!(act.sample_discrete(&mut rng).unwrap() < 4);
        }
    }
}
