use super::LATENT_DIM;
use crate::result::Result;
use candle_core::{Module, Tensor};
use candle_nn::{
    conv_transpose2d, linear, ops::sigmoid, ConvTranspose2d, ConvTranspose2dConfig, Linear,
    VarBuilder,
};

/// Maps latent vectors to images with pixels in (0, 1).
///
/// \[batch_size, [`LATENT_DIM`]\] -> \[batch_size, 1, 28, 28\]
#[derive(Debug)]
pub struct Decoder {
    dense1: Linear,
    dense2: Linear,
    deconv1: ConvTranspose2d,
    deconv2: ConvTranspose2d,
}

impl Decoder {
    /// Creates the decoder.
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let upsample = ConvTranspose2dConfig {
            padding: 1,
            stride: 2,
            ..Default::default()
        };
        let dense1 = linear(LATENT_DIM, 256, vb.pp("dense1"))?;
        let dense2 = linear(256, 64 * 7 * 7, vb.pp("dense2"))?;
        let deconv1 = conv_transpose2d(64, 32, 4, upsample, vb.pp("deconv1"))?;
        let deconv2 = conv_transpose2d(32, 1, 4, upsample, vb.pp("deconv2"))?;
        Ok(Self {
            dense1,
            dense2,
            deconv1,
            deconv2,
        })
    }
}

impl Module for Decoder {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let Self {
            dense1,
            dense2,
            deconv1,
            deconv2,
        } = self;
        let (batch_size, _) = xs.dims2()?;
        let x = dense1.forward(xs)?.relu()?;
        let x = dense2.forward(&x)?.relu()?.reshape((batch_size, 64, 7, 7))?;
        let x = deconv1.forward(&x)?.relu()?;
        sigmoid(&deconv2.forward(&x)?)
    }
}
