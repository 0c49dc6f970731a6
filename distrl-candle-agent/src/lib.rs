//! Candle networks for the distributional agents of
//! [distrl_core](https://crates.io/crates/distrl-core).
//!
//! [`C51Model`] implements [`distrl_core::distributional::DistributionalModel`] on top
//! of any [`SubModel`], e.g., [`mlp::Mlp`] for feature vectors and [`cnn::Cnn`] for
//! stacked image frames.
mod c51_model;
pub mod cnn;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
pub use c51_model::{C51Model, C51ModelConfig};
pub use model::SubModel;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
        }
    }
}
