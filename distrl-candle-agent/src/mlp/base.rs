use super::MlpConfig;
use crate::model::SubModel;
use anyhow::Result;
use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// Returns vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut dims = vec![config.in_dim];
    dims.extend(config.units.iter().copied());
    dims.push(config.out_dim);
    let vs = vs.pp(prefix);

    dims.windows(2)
        .enumerate()
        .map(|(i, d)| Ok(linear(d[0], d[1], vs.pp(format!("ln{}", i)))?))
        .collect()
}

/// Multilayer perceptron with ReLU activation function.
///
/// The output layer has no activation; its outputs are the logits of the distributions.
pub struct Mlp {
    device: Device,
    layers: Vec<Linear>,
}

impl SubModel for Mlp {
    type Config = MlpConfig;

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.to_device(&self.device)?;
        let n_layers = self.layers.len();
        for (i, layer) in self.layers.iter().enumerate() {
            xs = layer.forward(&xs)?;
            if i + 1 < n_layers {
                xs = xs.relu()?;
            }
        }
        Ok(xs)
    }

    fn build(vs: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vs.device().clone();
        let layers = create_linear_layers("mlp", vs, &config)?;
        Ok(Self { device, layers })
    }
}
