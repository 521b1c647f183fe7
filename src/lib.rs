/*!
# mnist-vae
Trains a variational autoencoder on MNIST or FashionMNIST.

The tensors, gradients and the optimizer are provided by [candle](candle_core). This crate
loads and batches the [dataset], defines the [encoders](learn::neural_network::encoder) and
the [decoder](learn::neural_network::decoder), the [losses](learn::criterion) and the
[trainer](learn::trainer), which writes sample grids and checkpoints as training progresses.

# Examples
```no_run
# use mnist_vae::{result::Result, artifacts::Artifacts, dataset::mnist::Mnist, learn::trainer::VaeTrainer};
# use candle_core::Device;
# use std::path::Path;
# fn main() -> Result<()> {
let artifacts = Artifacts::create(Path::new("data"), Path::new("results"))?;
let mnist = Mnist::builder().path(Path::new("data")).download(true).build()?;
let mut trainer = VaeTrainer::builder(Device::Cpu).batch_size(128).seed(0).build()?;
trainer.fit(mnist.train(), mnist.test(), &artifacts, 10)?;
# Ok(())
# }
```
*/
#![warn(missing_docs)]

/// Results.
pub mod result {
    pub use anyhow::{Error, Result};
}

pub mod artifacts;
#[cfg(feature = "mnist")]
pub mod config;
pub mod dataset;
pub mod device;
pub mod grid;
/// Machine learning.
pub mod learn;
pub mod logging;
