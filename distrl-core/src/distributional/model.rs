use super::Distributions;
use anyhow::Result;
use std::path::Path;

/// Online and target networks producing value distributions.
///
/// States are flattened stacked states of `f32`, `batch_size` of them in row-major order.
/// Both networks share the architecture; the target network changes only on
/// [`DistributionalModel::sync_target`].
pub trait DistributionalModel: Send + Sync {
    /// Number of actions.
    fn n_actions(&self) -> usize;

    /// Number of atoms per distribution.
    fn n_atoms(&self) -> usize;

    /// Distributions of the online network.
    fn forward(&self, states: &[f32], batch_size: usize) -> Result<Distributions>;

    /// Distributions of the target network.
    fn forward_target(&self, states: &[f32], batch_size: usize) -> Result<Distributions>;

    /// One optimization step on the cross-entropy between `target` (`[batch, n_atoms]`)
    /// and the online distribution of the taken `actions`. Returns the loss.
    fn train_step(&mut self, states: &[f32], actions: &[usize], target: &[f32], lr: f64)
        -> Result<f32>;

    /// Copies the online parameters into the target network.
    fn sync_target(&mut self) -> Result<()>;

    /// Saves the parameters of both networks in the directory `path`.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Loads the parameters of both networks from the directory `path`.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
