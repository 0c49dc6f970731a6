use super::Support;
use crate::error::DistrlError;
use rand::Rng;

/// Index of the first maximum. Returns 0 for an empty slice.
pub fn argmax(xs: &[f32]) -> usize {
    let mut best = 0;
    for (i, x) in xs.iter().enumerate().skip(1) {
        if *x > xs[best] {
            best = i;
        }
    }
    best
}

/// Value distributions of a batch of states, `[batch, n_actions, n_atoms]` in row-major
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Distributions {
    probs: Vec<f32>,
    batch_size: usize,
    n_actions: usize,
    n_atoms: usize,
}

impl Distributions {
    /// Wraps probabilities of shape `[batch_size, n_actions, n_atoms]`.
    pub fn new(
        probs: Vec<f32>,
        batch_size: usize,
        n_actions: usize,
        n_atoms: usize,
    ) -> Result<Self, DistrlError> {
        let expected = batch_size * n_actions * n_atoms;
        if probs.len() != expected {
            return Err(DistrlError::ShapeMismatch {
                expected,
                actual: probs.len(),
            });
        }
        Ok(Self {
            probs,
            batch_size,
            n_actions,
            n_atoms,
        })
    }

    /// Number of states.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of actions per state.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Number of atoms per distribution.
    pub fn n_atoms(&self) -> usize {
        self.n_atoms
    }

    /// Probabilities in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.probs
    }

    /// Distribution of action `a` in state `b`.
    pub fn get(&self, b: usize, a: usize) -> &[f32] {
        let start = (b * self.n_actions + a) * self.n_atoms;
        &self.probs[start..start + self.n_atoms]
    }

    /// Expected action values, `[batch, n_actions]`.
    pub fn expected_values(&self, support: &Support) -> Vec<f32> {
        self.probs
            .chunks(self.n_atoms)
            .map(|p| support.expected_value(p))
            .collect()
    }

    /// Argmax of the expected values in each state.
    pub fn greedy_actions(&self, support: &Support) -> Vec<usize> {
        self.expected_values(support)
            .chunks(self.n_actions)
            .map(argmax)
            .collect()
    }

    /// Actions maximizing a sampled return.
    ///
    /// For each state one quantile `u ~ U[0, 1)` is drawn and shared by all actions.
    /// Each action's return is the atom where its cumulative mass first exceeds `u`.
    pub fn sampled_actions<R: Rng + ?Sized>(&self, support: &Support, rng: &mut R) -> Vec<usize> {
        let atoms = support.atoms();
        (0..self.batch_size)
            .map(|b| {
                let u = rng.gen::<f32>();
                let returns: Vec<f32> = (0..self.n_actions)
                    .map(|a| atoms[inverse_cdf(self.get(b, a), u)])
                    .collect();
                argmax(&returns)
            })
            .collect()
    }

    /// Distributions of the given action in each state, `[batch, n_atoms]`.
    pub fn select(&self, actions: &[usize]) -> Result<Vec<f32>, DistrlError> {
        if actions.len() != self.batch_size {
            return Err(DistrlError::ShapeMismatch {
                expected: self.batch_size,
                actual: actions.len(),
            });
        }
        let mut out = Vec::with_capacity(self.batch_size * self.n_atoms);
        for (b, &a) in actions.iter().enumerate() {
            if a >= self.n_actions {
                return Err(DistrlError::ShapeMismatch {
                    expected: self.n_actions,
                    actual: a,
                });
            }
            out.extend_from_slice(self.get(b, a));
        }
        Ok(out)
    }
}

/// Smallest atom index whose cumulative mass exceeds `u`.
///
/// Rounding may leave the total mass below `u`; the last atom with mass is used then.
fn inverse_cdf(probs: &[f32], u: f32) -> usize {
    let mut cdf = 0.0;
    let mut last = 0;
    for (i, p) in probs.iter().enumerate() {
        if *p > 0.0 {
            last = i;
        }
        cdf += p;
        if cdf > u {
            return i;
        }
    }
    last
}
