/*!
# Examples
A VAE is constructed from a [`VarBuilder`], which creates its parameters in a [`VarMap`](candle_nn::VarMap).
```
# use mnist_vae::{result::Result, learn::neural_network::{NoiseSampler, Topology, Vae}};
# use candle_core::{DType, Device, Tensor};
# use candle_nn::{VarBuilder, VarMap};
# fn main() -> Result<()> {
let device = Device::Cpu;
let varmap = VarMap::new();
let vae = Vae::new(Topology::Conv, VarBuilder::from_varmap(&varmap, DType::F32, &device))?;
let mut noise = NoiseSampler::from_seed(0);
let x = Tensor::zeros((2, 1, 28, 28), DType::F32, &device)?;
let output = vae.forward(&x, &mut noise)?;
assert_eq!(output.reconstruction.dims(), x.dims());
# Ok(())
# }
```
*/
use crate::result::Result;
use anyhow::{anyhow, ensure, Context};
use candle_core::{Device, Module, Shape, Tensor};
use candle_nn::{VarBuilder, VarMap};
use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Decoder.
pub mod decoder;
/// Encoders.
pub mod encoder;

pub use decoder::Decoder;
pub use encoder::{ConvPoolEncoder, Encode, Encoder, MaxPoolEncoder, Topology};

/// The dimensionality of the latent space.
pub const LATENT_DIM: usize = 16;

/// Source of the standard normal noise used for sampling.
///
/// All randomness of a [`Vae`] comes from here, so a seeded sampler makes the forward pass
/// reproducible.
#[derive(Clone, Debug)]
pub struct NoiseSampler {
    rng: StdRng,
}

impl NoiseSampler {
    /// Creates a sampler seeded with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
    /// Draws a tensor of N(0, 1) samples.
    pub fn sample<S: Into<Shape>>(&mut self, shape: S, device: &Device) -> Result<Tensor> {
        let shape = shape.into();
        let values: Vec<f32> = (&mut self.rng)
            .sample_iter(StandardNormal)
            .take(shape.elem_count())
            .collect();
        Ok(Tensor::from_vec(values, shape, device)?)
    }
}

/// Samples `mean + exp(log_var / 2) * eps`.
///
/// Differentiable with respect to `mean` and `log_var`.
pub fn reparameterize(mean: &Tensor, log_var: &Tensor, eps: &Tensor) -> Result<Tensor> {
    let std = log_var.affine(0.5, 0.)?.exp()?;
    Ok(mean.add(&std.mul(eps)?)?)
}

/// The output of [`Vae::forward()`].
#[derive(Clone, Debug)]
pub struct VaeOutput {
    /// Shape = input shape.
    pub reconstruction: Tensor,
    /// Shape = \[batch_size, [`LATENT_DIM`]\].
    pub mean: Tensor,
    /// Shape = \[batch_size, [`LATENT_DIM`]\].
    pub log_var: Tensor,
}

/// Variational autoencoder.
#[derive(Debug)]
pub struct Vae {
    topology: Topology,
    encoder: Encoder,
    decoder: Decoder,
}

impl Vae {
    /// Creates the encoder under "encoder" and the decoder under "decoder".
    pub fn new(topology: Topology, vb: VarBuilder) -> Result<Self> {
        let encoder = Encoder::new(topology, vb.pp("encoder"))?;
        let decoder = Decoder::new(vb.pp("decoder"))?;
        Ok(Self {
            topology,
            encoder,
            decoder,
        })
    }
    /// The encoder topology.
    pub fn topology(&self) -> Topology {
        self.topology
    }
    /// The encoder.
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }
    /// The decoder.
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }
    /// Encodes `xs`, samples a latent vector with `noise` and decodes it.
    pub fn forward(&self, xs: &Tensor, noise: &mut NoiseSampler) -> Result<VaeOutput> {
        let (mean, log_var) = self.encoder.encode(xs)?;
        let eps = noise.sample(mean.dims().to_vec(), mean.device())?;
        let z = reparameterize(&mean, &log_var, &eps)?;
        let reconstruction = self.decoder.forward(&z)?;
        Ok(VaeOutput {
            reconstruction,
            mean,
            log_var,
        })
    }
}

/// Redraws every parameter in `varmap` from `rng`.
///
/// Weights and biases are drawn from U(-1 / sqrt(fan_in), 1 / sqrt(fan_in)), where fan_in is
/// the product of the weight's dimensions after the first. Parameters are visited in name order
/// so that the result only depends on the state of `rng`.
pub fn init_parameters<R: Rng>(varmap: &VarMap, rng: &mut R) -> Result<()> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("parameters poisoned"))?;
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();
    for name in names {
        let var = &vars[name];
        let weight_name = match name.strip_suffix("bias") {
            Some(prefix) => format!("{prefix}weight"),
            None => name.clone(),
        };
        let weight = vars
            .get(&weight_name)
            .with_context(|| format!("no weight for {name}"))?;
        let dims = weight.dims();
        ensure!(dims.len() >= 2, "{weight_name} has shape {dims:?}");
        let fan_in: usize = dims[1..].iter().product();
        let bound = 1. / (fan_in as f32).sqrt();
        let values: Vec<f32> = (&mut *rng)
            .sample_iter(Uniform::new_inclusive(-bound, bound))
            .take(var.elem_count())
            .collect();
        var.set(&Tensor::from_vec(values, var.dims().to_vec(), var.device())?)?;
    }
    Ok(())
}
