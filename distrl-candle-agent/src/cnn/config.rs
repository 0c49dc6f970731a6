use crate::util::OutDim;
use serde::{Deserialize, Serialize};

fn default_channels() -> usize {
    1
}

fn default_scale() -> f64 {
    1.0 / 255.0
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Cnn`](super::Cnn).
///
/// A stacked state consists of `n_stack` frames of shape `[height, width, channels]`.
pub struct CnnConfig {
    pub(super) n_stack: usize,
    pub(super) height: usize,
    pub(super) width: usize,
    #[serde(default = "default_channels")]
    pub(super) channels: usize,
    pub(super) out_dim: usize,
    /// Factor applied to the input, mapping 8-bit pixels to `[0, 1]` by default.
    #[serde(default = "default_scale")]
    pub(super) scale: f64,
}

impl CnnConfig {
    /// Configuration for `n_stack` frames of shape `frame_shape`, `[height, width]` or
    /// `[height, width, channels]`.
    pub fn new(n_stack: usize, frame_shape: &[usize], out_dim: usize) -> Self {
        Self {
            n_stack,
            height: frame_shape.first().copied().unwrap_or(0),
            width: frame_shape.get(1).copied().unwrap_or(0),
            channels: frame_shape.get(2).copied().unwrap_or(1),
            out_dim,
            scale: default_scale(),
        }
    }

    pub fn scale(mut self, v: f64) -> Self {
        self.scale = v;
        self
    }

    /// Length of a flattened stacked state.
    pub fn in_dim(&self) -> usize {
        self.n_stack * self.height * self.width * self.channels
    }
}

impl OutDim for CnnConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: usize) {
        self.out_dim = v;
    }
}
