use super::CnnConfig;
use crate::model::SubModel;
use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use candle_nn::{conv::Conv2dConfig, conv2d_no_bias, linear, Conv2d, Linear, Module, VarBuilder};

/// `(kernel, stride)` of the convolutional layers.
const CONV_LAYERS: [(usize, usize); 3] = [(8, 4), (4, 2), (3, 1)];

/// Side length after a valid convolution, `None` if the kernel does not fit.
fn conv_out(len: usize, kernel: usize, stride: usize) -> Option<usize> {
    len.checked_sub(kernel).map(|d| d / stride + 1)
}

#[allow(clippy::upper_case_acronyms)]
/// Convolutional neural network, which has the same architecture of the DQN paper.
///
/// Stacked frames are laid out as `[n_stack, height, width, channels]` and fed to the
/// first layer as `n_stack * channels` input planes.
pub struct Cnn {
    config: CnnConfig,
    device: Device,
    c1: Conv2d,
    c2: Conv2d,
    c3: Conv2d,
    l1: Linear,
    l2: Linear,
}

impl Cnn {
    fn stride(s: usize) -> Conv2dConfig {
        Conv2dConfig {
            stride: s,
            ..Default::default()
        }
    }

    /// Number of features after the convolutional layers.
    fn flat_dim(config: &CnnConfig) -> Result<usize> {
        let side = |len: usize| {
            CONV_LAYERS
                .iter()
                .try_fold(len, |len, &(k, s)| conv_out(len, k, s))
                .ok_or_else(|| anyhow!("frames of {}x{} are too small", config.height, config.width))
        };
        Ok(64 * side(config.height)? * side(config.width)?)
    }
}

impl SubModel for Cnn {
    type Config = CnnConfig;

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let c = &self.config;
        let batch_size = xs.dims()[0];
        let xs = xs
            .to_device(&self.device)?
            .reshape((batch_size, c.n_stack, c.height, c.width, c.channels))?
            .permute((0, 1, 4, 2, 3))?
            .contiguous()?
            .reshape((batch_size, c.n_stack * c.channels, c.height, c.width))?;
        let xs = (xs * c.scale)?;
        let xs = self.c1.forward(&xs)?.relu()?;
        let xs = self.c2.forward(&xs)?.relu()?;
        let xs = self.c3.forward(&xs)?.relu()?.flatten_from(1)?;
        let xs = self.l1.forward(&xs)?.relu()?;
        Ok(self.l2.forward(&xs)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let flat_dim = Self::flat_dim(&config)?;
        let in_planes = config.n_stack * config.channels;
        let [(k1, s1), (k2, s2), (k3, s3)] = CONV_LAYERS;
        let c1 = conv2d_no_bias(in_planes, 32, k1, Self::stride(s1), vb.pp("c1"))?;
        let c2 = conv2d_no_bias(32, 64, k2, Self::stride(s2), vb.pp("c2"))?;
        let c3 = conv2d_no_bias(64, 64, k3, Self::stride(s3), vb.pp("c3"))?;
        let l1 = linear(flat_dim, 512, vb.pp("l1"))?;
        let l2 = linear(512, config.out_dim, vb.pp("l2"))?;

        Ok(Self {
            config,
            device,
            c1,
            c2,
            c3,
            l1,
            l2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_flat_dim() -> Result<()> {
        assert_eq!(Cnn::flat_dim(&CnnConfig::new(4, &[84, 84, 1], 6))?, 3136);
        assert!(Cnn::flat_dim(&CnnConfig::new(4, &[20, 84, 1], 6)).is_err());
        Ok(())
    }

    #[test]
    fn test_output_shape() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = CnnConfig::new(2, &[36, 36], 5);
        let xs = Tensor::zeros((3, config.in_dim()), DType::F32, &Device::Cpu)?;
        let cnn = Cnn::build(vb, config)?;
        assert_eq!(cnn.forward(&xs)?.dims(), &[3, 5]);
        Ok(())
    }
}
