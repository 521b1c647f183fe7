use anyhow::{anyhow, Result};
use candle_core::Device;
use mnist_vae::{
    dataset::{ImageBatch, ImageSet},
    learn::{neural_network::Topology, trainer::VaeTrainer},
};
use ndarray::ArcArray;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_image_set(n: usize) -> Result<ImageSet> {
    let mut rng = StdRng::seed_from_u64(0);
    let images: Vec<u8> = (0..n * 28 * 28).map(|_| rng.gen()).collect();
    ImageSet::new(
        ArcArray::from_shape_vec([n, 1, 28, 28], images)?,
        vec![0u8; n].into(),
    )
}

/// A trainer and a fixed batch of random images.
pub struct VaeStep {
    trainer: VaeTrainer,
    batch: ImageBatch,
}

impl VaeStep {
    pub fn new(device: Device, topology: Topology, batch_size: usize) -> Result<Self> {
        let set = random_image_set(batch_size)?;
        let batch = set
            .batches::<StdRng>(&device, batch_size, None)?
            .next()
            .ok_or_else(|| anyhow!("empty set"))??;
        let trainer = VaeTrainer::builder(device)
            .topology(topology)
            .batch_size(batch_size)
            .seed(0)
            .build()?;
        Ok(Self { trainer, batch })
    }
    pub fn infer(&mut self) -> Result<()> {
        let (loss, _) = self.trainer.evaluate(&self.batch)?;
        loss.to_scalar::<f32>()?;
        Ok(())
    }
    pub fn train(&mut self) -> Result<()> {
        self.trainer.step(&self.batch)?;
        Ok(())
    }
}
