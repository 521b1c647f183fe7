use super::{
    criterion::{Criterion, LossKind},
    neural_network::{init_parameters, NoiseSampler, Topology, Vae, VaeOutput, LATENT_DIM},
    EpochRecord, Stats, Summarize, Summary,
};
use crate::{
    artifacts::{is_checkpoint_epoch, Artifacts},
    dataset::{ImageBatch, ImageSet},
    grid::save_image,
    result::Result,
};
use anyhow::ensure;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{path::Path, time::Instant};
use tracing::{debug, info};

/// Images per row of the sample grid.
const SAMPLE_ROW: usize = 8;
/// Test images compared with their reconstructions each epoch.
const COMPARISON_LEN: usize = 8;

/// VaeTrainer builder.
pub mod builders {
    use super::*;

    /// VaeTrainer builder.
    #[derive(Debug, Clone)]
    pub struct VaeTrainerBuilder {
        pub(super) device: Device,
        pub(super) topology: Topology,
        pub(super) loss: LossKind,
        pub(super) learning_rate: f64,
        pub(super) batch_size: usize,
        pub(super) samples: usize,
        pub(super) seed: Option<u64>,
    }

    impl VaeTrainerBuilder {
        pub(super) fn new(device: Device) -> Self {
            Self {
                device,
                topology: Topology::default(),
                loss: LossKind::default(),
                learning_rate: 1e-3,
                batch_size: 1024,
                samples: 64,
                seed: None,
            }
        }
        /// The encoder topology. Defaults to [`Topology::Conv`].
        pub fn topology(self, topology: Topology) -> Self {
            Self { topology, ..self }
        }
        /// The loss. Defaults to [`LossKind::Bce`].
        pub fn loss(self, loss: LossKind) -> Self {
            Self { loss, ..self }
        }
        /// The Adam learning rate. Defaults to 1e-3.
        pub fn learning_rate(self, learning_rate: f64) -> Self {
            Self {
                learning_rate,
                ..self
            }
        }
        /// The batch size for training and testing. Defaults to 1024.
        pub fn batch_size(self, batch_size: usize) -> Self {
            Self { batch_size, ..self }
        }
        /// The number of images decoded from the fixed latent batch each epoch. Defaults to 64.
        pub fn samples(self, samples: usize) -> Self {
            Self { samples, ..self }
        }
        /// Seeds parameter initialization, shuffling and sampling. Defaults to a random seed.
        pub fn seed(self, seed: u64) -> Self {
            Self {
                seed: Some(seed),
                ..self
            }
        }
        /// Builds the trainer.
        ///
        /// **Errors**
        /// - `batch_size` or `samples` is 0.
        /// - `learning_rate` is not positive.
        /// - The parameters could not be created on the device.
        pub fn build(self) -> Result<VaeTrainer> {
            VaeTrainer::build(self)
        }
    }
}
use builders::VaeTrainerBuilder;

/// The state of a [`VaeTrainer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Built, not yet trained.
    Initializing,
    /// Updating the parameters on the training set.
    Training,
    /// Computing the loss on the test set.
    Evaluating,
    /// Decoding the fixed latent batch.
    Sampling,
    /// Saving the parameters.
    Checkpointing,
    /// All epochs of [`VaeTrainer::fit()`] have run.
    Completed,
}

/// Trains a [`Vae`] with Adam.
///
/// The trainer exclusively owns the parameters, which are mutated in place by each
/// [`.step()`](VaeTrainer::step).
pub struct VaeTrainer {
    device: Device,
    varmap: VarMap,
    model: Vae,
    optimizer: AdamW,
    loss: LossKind,
    batch_size: usize,
    noise: NoiseSampler,
    shuffle: StdRng,
    sample_latent: Tensor,
    summary: Summary,
    history: Vec<EpochRecord>,
    phase: Phase,
}

impl VaeTrainer {
    /// Returns a [`VaeTrainerBuilder`] for a trainer on `device`.
    pub fn builder(device: Device) -> VaeTrainerBuilder {
        VaeTrainerBuilder::new(device)
    }
    fn build(builder: VaeTrainerBuilder) -> Result<Self> {
        let VaeTrainerBuilder {
            device,
            topology,
            loss,
            learning_rate,
            batch_size,
            samples,
            seed,
        } = builder;
        ensure!(batch_size > 0, "batch_size must be greater than 0");
        ensure!(samples > 0, "samples must be greater than 0");
        ensure!(
            learning_rate > 0.,
            "learning_rate must be positive, found {learning_rate}"
        );
        let seed = seed.unwrap_or_else(rand::random);
        debug!("seed = {seed}");
        let mut rng = StdRng::seed_from_u64(seed);
        let varmap = VarMap::new();
        let model = Vae::new(
            topology,
            VarBuilder::from_varmap(&varmap, DType::F32, &device),
        )?;
        init_parameters(&varmap, &mut rng)?;
        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: learning_rate,
                weight_decay: 0.,
                ..Default::default()
            },
        )?;
        let mut noise = NoiseSampler::from_seed(rng.gen());
        let shuffle = StdRng::seed_from_u64(rng.gen());
        let sample_latent = noise.sample((samples, LATENT_DIM), &device)?;
        Ok(Self {
            device,
            varmap,
            model,
            optimizer,
            loss,
            batch_size,
            noise,
            shuffle,
            sample_latent,
            summary: Summary::default(),
            history: Vec::new(),
            phase: Phase::Initializing,
        })
    }
    /// The device.
    pub fn device(&self) -> &Device {
        &self.device
    }
    /// The parameters.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }
    /// The model.
    pub fn model(&self) -> &Vae {
        &self.model
    }
    /// The loss.
    pub fn loss(&self) -> LossKind {
        self.loss
    }
    /// The encoder topology.
    pub fn topology(&self) -> Topology {
        self.model.topology()
    }
    /// The batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }
    /// The records of completed epochs.
    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }
    /// The fixed latent batch decoded by [`.sample()`](Self::sample).
    pub fn sample_latent(&self) -> &Tensor {
        &self.sample_latent
    }
    /// Computes the loss of `batch`, summed over its images.
    ///
    /// Does not modify the parameters.
    pub fn evaluate(&mut self, batch: &ImageBatch) -> Result<(Tensor, VaeOutput)> {
        let output = self.model.forward(&batch.images, &mut self.noise)?;
        let loss = self.loss.eval(&output, &batch.images)?;
        Ok((loss, output))
    }
    /// Performs one optimization step on `batch`.
    ///
    /// Returns the loss before the update, summed over the images of the batch.
    pub fn step(&mut self, batch: &ImageBatch) -> Result<f32> {
        let (loss, _) = self.evaluate(batch)?;
        self.optimizer.backward_step(&loss)?;
        Ok(loss.to_scalar::<f32>()?)
    }
    /// Trains on a shuffled pass over `train_set`.
    pub fn train_epoch(&mut self, train_set: &ImageSet, bar: &ProgressBar) -> Result<Stats> {
        self.phase = Phase::Training;
        let mut stats = Stats::default();
        let batches = train_set.batches(&self.device, self.batch_size, Some(&mut self.shuffle))?;
        for batch in batches {
            let batch = batch?;
            let loss = self.step(&batch)?;
            stats.accumulate(batch.len(), loss);
            bar.inc(1);
        }
        Ok(stats)
    }
    /// Evaluates an ordered pass over `test_set`.
    ///
    /// Also returns the first images of the set followed by their reconstructions.
    pub fn test_epoch(
        &mut self,
        test_set: &ImageSet,
        bar: &ProgressBar,
    ) -> Result<(Stats, Option<Tensor>)> {
        self.phase = Phase::Evaluating;
        let mut stats = Stats::default();
        let mut comparison = None;
        let batches = test_set.batches::<StdRng>(&self.device, self.batch_size, None)?;
        for batch in batches {
            let batch = batch?;
            let (loss, output) = self.evaluate(&batch)?;
            stats.accumulate(batch.len(), loss.to_scalar::<f32>()?);
            if comparison.is_none() {
                let n = batch.len().min(COMPARISON_LEN);
                comparison.replace(Tensor::cat(
                    &[
                        &batch.images.narrow(0, 0, n)?,
                        &output.reconstruction.narrow(0, 0, n)?,
                    ],
                    0,
                )?);
            }
            bar.inc(1);
        }
        Ok((stats, comparison))
    }
    /// Decodes the fixed latent batch.
    pub fn sample(&mut self) -> Result<Tensor> {
        self.phase = Phase::Sampling;
        Ok(self.model.decoder().forward(&self.sample_latent)?)
    }
    /// Saves the parameters to `path` as safetensors.
    pub fn save_checkpoint(&mut self, path: &Path) -> Result<()> {
        self.phase = Phase::Checkpointing;
        self.varmap.save(path)?;
        Ok(())
    }
    /// Trains for `epochs`, writing samples, reconstructions, checkpoints and the history to
    /// `artifacts`.
    ///
    /// Prints the losses after each epoch.
    ///
    /// **Errors**
    /// Training stops at the first error, leaving the files of the completed epochs.
    pub fn fit(
        &mut self,
        train_set: &ImageSet,
        test_set: &ImageSet,
        artifacts: &Artifacts,
        epochs: usize,
    ) -> Result<()> {
        ensure!(epochs > 0, "epochs must be greater than 0");
        ensure!(!train_set.is_empty(), "empty training set");
        ensure!(!test_set.is_empty(), "empty test set");
        info!("Training...");
        let style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos:>5}/{len:5} [eta: {eta}]")?
            .progress_chars("=> ");
        let batch_count =
            train_set.batch_count(self.batch_size) + test_set.batch_count(self.batch_size);
        for epoch in 1..=epochs {
            let start = Instant::now();
            let bar = ProgressBar::new(batch_count as u64)
                .with_style(style.clone())
                .with_message(format!("epoch {epoch}"));
            let train = self.train_epoch(train_set, &bar)?;
            let (test, comparison) = self.test_epoch(test_set, &bar)?;
            bar.finish_and_clear();
            let elapsed = start.elapsed();
            self.summary.record(elapsed, train, test);
            println!(
                "Epoch: {epoch}/{epochs:02} | Train loss: {:02.7} | Test loss: {:02.7} | Time: {:.7}",
                train.mean_loss(),
                test.mean_loss(),
                elapsed.as_secs_f64(),
            );
            if let Some(comparison) = comparison {
                save_image(
                    &comparison,
                    COMPARISON_LEN,
                    &artifacts.reconstruction_path(epoch),
                )?;
            }
            let samples = self.sample()?;
            save_image(&samples, SAMPLE_ROW, &artifacts.sample_path(epoch))?;
            if is_checkpoint_epoch(epoch, epochs) {
                let path =
                    artifacts.checkpoint_path(self.loss, self.topology(), epoch, test.mean_loss());
                self.save_checkpoint(&path)?;
                info!("SAVING weights at {}", path.display());
            }
            self.history.push(EpochRecord::from(&self.summary));
            artifacts.write_history(&self.history)?;
        }
        self.phase = Phase::Completed;
        info!("Completed!");
        Ok(())
    }
}

impl Summarize for VaeTrainer {
    fn summarize(&self) -> Summary {
        self.summary.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = VaeTrainer::builder(Device::Cpu);
        assert_eq!(builder.topology, Topology::Conv);
        assert_eq!(builder.loss, LossKind::Bce);
        assert_eq!(builder.batch_size, 1024);
        assert_eq!(builder.learning_rate, 1e-3);
        assert_eq!(builder.samples, 64);
    }

    #[test]
    fn builder_rejects_zero_batch_size() {
        let result = VaeTrainer::builder(Device::Cpu).batch_size(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn build_initializing() -> Result<()> {
        let trainer = VaeTrainer::builder(Device::Cpu)
            .topology(Topology::MaxPool)
            .loss(LossKind::Mse)
            .samples(4)
            .seed(1)
            .build()?;
        assert_eq!(trainer.phase(), Phase::Initializing);
        assert_eq!(trainer.topology(), Topology::MaxPool);
        assert_eq!(trainer.sample_latent().dims(), [4, LATENT_DIM]);
        assert_eq!(trainer.summarize().epoch(), 0);
        Ok(())
    }
}
