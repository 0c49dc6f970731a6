//! Interface of neural networks used in the agents.
use anyhow::Result;
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// Neural network not owning its [`VarMap`] internally.
///
/// The input is a batch of flattened stacked states, `[batch_size, state_len]`. The
/// output has [`SubModel::Config`]'s output dimension per state.
///
/// [`VarMap`]: candle_nn::VarMap
pub trait SubModel: Sized + Send + Sync {
    /// Configuration from which [`SubModel`] is constructed.
    type Config;

    /// Builds [`SubModel`] with [`VarBuilder`] and [`SubModel::Config`].
    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self>;

    /// Forward pass.
    fn forward(&self, xs: &Tensor) -> Result<Tensor>;
}
