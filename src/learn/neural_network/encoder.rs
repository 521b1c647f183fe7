use super::LATENT_DIM;
use crate::result::Result;
use candle_core::{Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use derive_more::Display;
use serde::Serialize;

const HIDDEN: usize = 256;
// 64 channels at 7 x 7 after two halvings of 28 x 28.
const FEATURES: usize = 64 * 7 * 7;

/// The encoder topology.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// [`ConvPoolEncoder`].
    #[default]
    #[display(fmt = "CONV")]
    Conv,
    /// [`MaxPoolEncoder`].
    #[display(fmt = "MAXP")]
    #[value(name = "maxp", alias = "max-pool")]
    #[serde(rename = "maxp")]
    MaxPool,
}

/// Maps an image batch to the parameters of the latent distribution.
pub trait Encode {
    /// Returns (mean, log_var), each with shape \[batch_size, [`LATENT_DIM`]\].
    ///
    /// **Errors**
    /// Returns an error if `xs` is not \[batch_size, 1, 28, 28\].
    fn encode(&self, xs: &Tensor) -> Result<(Tensor, Tensor)>;
}

fn padded(padding: usize) -> Conv2dConfig {
    Conv2dConfig {
        padding,
        ..Default::default()
    }
}

fn strided(stride: usize, padding: usize) -> Conv2dConfig {
    Conv2dConfig {
        padding,
        stride,
        ..Default::default()
    }
}

#[derive(Debug)]
struct LatentHead {
    dense: Linear,
    mean: Linear,
    log_var: Linear,
}

impl LatentHead {
    fn new(vb: &VarBuilder) -> Result<Self> {
        let dense = linear(FEATURES, HIDDEN, vb.pp("dense"))?;
        let mean = linear(HIDDEN, LATENT_DIM, vb.pp("mean"))?;
        let log_var = linear(HIDDEN, LATENT_DIM, vb.pp("log_var"))?;
        Ok(Self {
            dense,
            mean,
            log_var,
        })
    }
    fn forward(&self, features: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = self.dense.forward(&features.flatten_from(1)?)?.relu()?;
        Ok((self.mean.forward(&x)?, self.log_var.forward(&x)?))
    }
}

/// Encoder that downsamples with strided convolutions.
#[derive(Debug)]
pub struct ConvPoolEncoder {
    conv1: Conv2d,
    pool1: Conv2d,
    conv2: Conv2d,
    pool2: Conv2d,
    head: LatentHead,
}

impl ConvPoolEncoder {
    /// Creates the encoder.
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let conv1 = conv2d(1, 32, 3, padded(1), vb.pp("conv1"))?;
        let pool1 = conv2d(32, 32, 4, strided(2, 1), vb.pp("pool1"))?;
        let conv2 = conv2d(32, 64, 3, padded(1), vb.pp("conv2"))?;
        let pool2 = conv2d(64, 64, 4, strided(2, 1), vb.pp("pool2"))?;
        let head = LatentHead::new(&vb)?;
        Ok(Self {
            conv1,
            pool1,
            conv2,
            pool2,
            head,
        })
    }
}

impl Encode for ConvPoolEncoder {
    fn encode(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let Self {
            conv1,
            pool1,
            conv2,
            pool2,
            head,
        } = self;
        let x = conv1.forward(xs)?.relu()?;
        let x = pool1.forward(&x)?.relu()?;
        let x = conv2.forward(&x)?.relu()?;
        let x = pool2.forward(&x)?.relu()?;
        head.forward(&x)
    }
}

/// Encoder that downsamples with 2 x 2 max pooling.
#[derive(Debug)]
pub struct MaxPoolEncoder {
    conv1: Conv2d,
    conv2: Conv2d,
    head: LatentHead,
}

impl MaxPoolEncoder {
    /// Creates the encoder.
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let conv1 = conv2d(1, 32, 3, padded(1), vb.pp("conv1"))?;
        let conv2 = conv2d(32, 64, 3, padded(1), vb.pp("conv2"))?;
        let head = LatentHead::new(&vb)?;
        Ok(Self { conv1, conv2, head })
    }
}

impl Encode for MaxPoolEncoder {
    fn encode(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        let x = self.conv1.forward(xs)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        self.head.forward(&x)
    }
}

/// An encoder of either [`Topology`].
#[derive(Debug)]
pub enum Encoder {
    /// [`Topology::Conv`].
    ConvPool(ConvPoolEncoder),
    /// [`Topology::MaxPool`].
    MaxPool(MaxPoolEncoder),
}

impl Encoder {
    /// Creates an encoder with `topology`.
    pub fn new(topology: Topology, vb: VarBuilder) -> Result<Self> {
        Ok(match topology {
            Topology::Conv => Self::ConvPool(ConvPoolEncoder::new(vb)?),
            Topology::MaxPool => Self::MaxPool(MaxPoolEncoder::new(vb)?),
        })
    }
    /// The topology.
    pub fn topology(&self) -> Topology {
        match self {
            Self::ConvPool(_) => Topology::Conv,
            Self::MaxPool(_) => Topology::MaxPool,
        }
    }
}

impl Encode for Encoder {
    fn encode(&self, xs: &Tensor) -> Result<(Tensor, Tensor)> {
        match self {
            Self::ConvPool(encoder) => encoder.encode(xs),
            Self::MaxPool(encoder) => encoder.encode(xs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn encode(topology: Topology, batch_size: usize) -> Result<(Tensor, Tensor)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = Encoder::new(topology, vb)?;
        assert_eq!(encoder.topology(), topology);
        let xs = Tensor::rand(0f32, 1., (batch_size, 1, 28, 28), &Device::Cpu)?;
        encoder.encode(&xs)
    }

    #[test]
    fn conv_pool_shape() -> Result<()> {
        let (mean, log_var) = encode(Topology::Conv, 3)?;
        assert_eq!(mean.dims(), [3, LATENT_DIM]);
        assert_eq!(log_var.dims(), [3, LATENT_DIM]);
        Ok(())
    }

    #[test]
    fn max_pool_shape() -> Result<()> {
        let (mean, log_var) = encode(Topology::MaxPool, 2)?;
        assert_eq!(mean.dims(), [2, LATENT_DIM]);
        assert_eq!(log_var.dims(), [2, LATENT_DIM]);
        Ok(())
    }

    #[test]
    fn wrong_image_size() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = Encoder::new(Topology::MaxPool, vb).unwrap();
        let xs = Tensor::zeros((1, 1, 32, 32), DType::F32, &Device::Cpu).unwrap();
        assert!(encoder.encode(&xs).is_err());
    }

    #[test]
    fn topology_display() {
        assert_eq!(Topology::Conv.to_string(), "CONV");
        assert_eq!(Topology::MaxPool.to_string(), "MAXP");
    }
}
