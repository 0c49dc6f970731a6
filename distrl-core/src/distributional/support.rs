use crate::error::DistrlError;
use serde::{Deserialize, Serialize};

/// Tolerance on the total mass of a probability vector.
pub const MASS_TOLERANCE: f64 = 1e-4;

/// Positions closer than this to an atom are treated as landing on it.
const SNAP_TOLERANCE: f64 = 1e-6;

/// Parameters of a [`Support`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct SupportConfig {
    /// Smallest atom.
    pub v_min: f32,
    /// Largest atom.
    pub v_max: f32,
    /// Number of atoms, at least 2.
    pub n_atoms: usize,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            v_min: -10.0,
            v_max: 10.0,
            n_atoms: 51,
        }
    }
}

/// `n_atoms` atoms evenly spaced over `[v_min, v_max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Support {
    v_min: f32,
    v_max: f32,
    dz: f32,
    atoms: Vec<f32>,
}

impl Support {
    /// Evenly spaced atoms from `v_min` to `v_max`.
    pub fn new(v_min: f32, v_max: f32, n_atoms: usize) -> Result<Self, DistrlError> {
        if !(v_min.is_finite() && v_max.is_finite()) || v_min >= v_max {
            return Err(DistrlError::config(format!(
                "support requires finite v_min < v_max, got [{}, {}]",
                v_min, v_max
            )));
        }
        if n_atoms < 2 {
            return Err(DistrlError::config(format!(
                "support requires at least 2 atoms, got {}",
                n_atoms
            )));
        }
        let dz = (v_max - v_min) / (n_atoms - 1) as f32;
        let atoms = (0..n_atoms).map(|i| v_min + i as f32 * dz).collect();
        Ok(Self {
            v_min,
            v_max,
            dz,
            atoms,
        })
    }

    /// Builds the support from its configuration.
    pub fn build(config: &SupportConfig) -> Result<Self, DistrlError> {
        Self::new(config.v_min, config.v_max, config.n_atoms)
    }

    /// Number of atoms.
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// Atom locations in increasing order.
    pub fn atoms(&self) -> &[f32] {
        &self.atoms
    }

    /// Distance between two neighbouring atoms.
    pub fn dz(&self) -> f32 {
        self.dz
    }

    /// Smallest atom.
    pub fn v_min(&self) -> f32 {
        self.v_min
    }

    /// Largest atom.
    pub fn v_max(&self) -> f32 {
        self.v_max
    }

    /// Mass-weighted sum of the atoms.
    pub fn expected_value(&self, probs: &[f32]) -> f32 {
        probs.iter().zip(self.atoms.iter()).map(|(p, z)| p * z).sum()
    }

    /// Projects `batch` distributions `target_z` (row-major `[batch, n_atoms]`) through
    /// `r + gamma * (1 - done) * z` back onto the support.
    ///
    /// Returns a fresh `[batch, n_atoms]` buffer. Rows of the input and of the output
    /// must be probability vectors.
    pub fn project(
        &self,
        target_z: &[f32],
        reward: &[f32],
        is_done: &[bool],
        gamma: f32,
    ) -> Result<Vec<f32>, DistrlError> {
        let n = self.n_atoms();
        let batch = reward.len();
        if is_done.len() != batch {
            return Err(DistrlError::ShapeMismatch {
                expected: batch,
                actual: is_done.len(),
            });
        }
        if target_z.len() != batch * n {
            return Err(DistrlError::ShapeMismatch {
                expected: batch * n,
                actual: target_z.len(),
            });
        }
        check_rows(target_z, n, "input")?;

        let v_min = self.v_min as f64;
        let v_max = self.v_max as f64;
        let top = (n - 1) as f64;
        let dz = (v_max - v_min) / top;
        let mut out = vec![0f64; batch * n];

        for b in 0..batch {
            let r = reward[b] as f64;
            let discount = if is_done[b] { 0.0 } else { gamma as f64 };
            let row = &target_z[b * n..(b + 1) * n];
            let acc = &mut out[b * n..(b + 1) * n];
            for (&p, &z) in row.iter().zip(self.atoms.iter()) {
                let p = p as f64;
                let tz = (r + discount * z as f64).clamp(v_min, v_max);
                let mut pos = ((tz - v_min) / dz).clamp(0.0, top);
                if (pos - pos.round()).abs() < SNAP_TOLERANCE {
                    pos = pos.round();
                }
                let lo = pos.floor();
                let hi = pos.ceil();
                if lo == hi {
                    acc[lo as usize] += p;
                } else {
                    acc[lo as usize] += p * (hi - pos);
                    acc[hi as usize] += p * (pos - lo);
                }
            }
        }

        let out: Vec<f32> = out.into_iter().map(|v| v as f32).collect();
        check_rows(&out, n, "projected")?;
        Ok(out)
    }
}

fn check_rows(probs: &[f32], n: usize, what: &str) -> Result<(), DistrlError> {
    for (b, row) in probs.chunks(n).enumerate() {
        if let Some(p) = row.iter().find(|p| !(**p >= 0.0)) {
            return Err(DistrlError::NumericalInvariant(format!(
                "{} row {} has invalid mass {}",
                what, b, p
            )));
        }
        let sum: f64 = row.iter().map(|p| *p as f64).sum();
        if (sum - 1.0).abs() > MASS_TOLERANCE {
            return Err(DistrlError::NumericalInvariant(format!(
                "{} row {} sums to {}",
                what, b, sum
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_dist(rng: &mut StdRng, n: usize) -> Vec<f32> {
        let xs: Vec<f32> = (0..n).map(|_| rng.gen::<f32>()).collect();
        let sum: f32 = xs.iter().sum();
        xs.into_iter().map(|x| x / sum).collect()
    }

    #[test]
    fn test_invalid_support() {
        assert!(Support::new(1.0, 1.0, 51).is_err());
        assert!(Support::new(2.0, -2.0, 51).is_err());
        assert!(Support::new(-1.0, 1.0, 1).is_err());
        let s = Support::new(-10.0, 10.0, 51).unwrap();
        assert_eq!(s.n_atoms(), 51);
        assert!((s.dz() - 0.4).abs() < 1e-6);
        assert_eq!(s.atoms()[0], -10.0);
    }

    #[test]
    fn test_project_example() {
        let s = Support::new(0.0, 2.0, 3).unwrap();
        let out = s.project(&[0.0, 1.0, 0.0], &[0.5], &[false], 1.0).unwrap();
        assert_eq!(out, vec![0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_project_rows_sum_to_one() {
        let s = Support::new(-10.0, 10.0, 51).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let batch = 64;
        let target_z: Vec<f32> = (0..batch).flat_map(|_| random_dist(&mut rng, 51)).collect();
        let reward: Vec<f32> = (0..batch).map(|_| rng.gen_range(-30.0..30.0)).collect();
        let is_done: Vec<bool> = (0..batch).map(|_| rng.gen_bool(0.3)).collect();

        let out = s.project(&target_z, &reward, &is_done, 0.99).unwrap();
        for row in out.chunks(51) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "{}", sum);
            assert!(row.iter().all(|p| *p >= 0.0));
        }
    }

    #[test]
    fn test_project_terminal_depends_on_reward_only() {
        let s = Support::new(-10.0, 10.0, 51).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_dist(&mut rng, 51);
        let b = random_dist(&mut rng, 51);
        let out_a = s.project(&a, &[1.3], &[true], 0.99).unwrap();
        let out_b = s.project(&b, &[1.3], &[true], 0.99).unwrap();
        for (x, y) in out_a.iter().zip(out_b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
        // 1.3 lies between atoms 28 (1.2) and 29 (1.6).
        let nonzero: Vec<usize> = (0..51).filter(|&i| out_a[i] > 0.0).collect();
        assert_eq!(nonzero, vec![28, 29]);
        assert!((out_a[28] - 0.75).abs() < 1e-5);
        assert!((out_a[29] - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_project_exact_bin_keeps_mass() {
        let s = Support::new(-2.0, 2.0, 5).unwrap();
        // Every shifted atom lands on an atom: all mass stays whole.
        let out = s
            .project(&[0.1, 0.2, 0.3, 0.4, 0.0], &[1.0], &[false], 1.0)
            .unwrap();
        assert_eq!(out, vec![0.0, 0.1, 0.2, 0.3, 0.4]);

        let out = s
            .project(&[0.25, 0.25, 0.25, 0.25, 0.0], &[0.0], &[true], 0.9)
            .unwrap();
        assert_eq!(out, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_project_clips_above_v_max() {
        let s = Support::new(-10.0, 10.0, 51).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let z = random_dist(&mut rng, 51);
        let low = s.project(&z, &[5.0], &[false], 0.99).unwrap();
        let high = s.project(&z, &[8.0], &[false], 0.99).unwrap();
        assert!(high[50] > low[50]);

        let out = s.project(&z, &[25.0], &[true], 0.99).unwrap();
        assert!((out[50] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_rejects_invalid_input() {
        let s = Support::new(0.0, 2.0, 3).unwrap();
        assert!(matches!(
            s.project(&[0.5, 0.5, 0.5], &[0.0], &[false], 0.9),
            Err(DistrlError::NumericalInvariant(_))
        ));
        assert!(matches!(
            s.project(&[1.5, -0.5, 0.0], &[0.0], &[false], 0.9),
            Err(DistrlError::NumericalInvariant(_))
        ));
        assert!(matches!(
            s.project(&[f32::NAN, 1.0, 0.0], &[0.0], &[false], 0.9),
            Err(DistrlError::NumericalInvariant(_))
        ));
        assert!(matches!(
            s.project(&[1.0, 0.0], &[0.0], &[false], 0.9),
            Err(DistrlError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_expected_value() {
        let s = Support::new(0.0, 2.0, 3).unwrap();
        assert!((s.expected_value(&[0.25, 0.25, 0.5]) - 1.25).abs() < 1e-6);
    }
}
