use serde::Serialize;
use std::time::Duration;

/// Loss functions.
pub mod criterion;
/// Networks.
pub mod neural_network;
/// Training.
pub mod trainer;

/// Training / Testing statistics.
#[derive(Default, Clone, Copy, Debug, Serialize)]
pub struct Stats {
    count: usize,
    loss: f64,
}

impl Stats {
    /// Adds a batch of `count` samples with summed `loss`.
    pub fn accumulate(&mut self, count: usize, loss: f32) {
        self.count += count;
        self.loss += f64::from(loss);
    }
    /// The number of samples.
    pub fn count(&self) -> usize {
        self.count
    }
    /// The loss summed over all samples.
    pub fn loss(&self) -> f64 {
        self.loss
    }
    /// The loss per sample, or 0 if there were no samples.
    pub fn mean_loss(&self) -> f32 {
        if self.count == 0 {
            0.
        } else {
            (self.loss / self.count as f64) as f32
        }
    }
}

/// Summary of training.
#[derive(Default, Clone, Debug)]
pub struct Summary {
    epoch: usize,
    epoch_time: Duration,
    total_time: Duration,
    train: Stats,
    test: Stats,
}

impl Summary {
    /// Records a completed epoch.
    ///
    /// Increments the epoch and accumulates the total time.
    pub fn record(&mut self, epoch_time: Duration, train: Stats, test: Stats) {
        self.epoch += 1;
        self.epoch_time = epoch_time;
        self.total_time += epoch_time;
        self.train = train;
        self.test = test;
    }
    /// The number of completed epochs.
    pub fn epoch(&self) -> usize {
        self.epoch
    }
    /// The duration of the last epoch.
    pub fn epoch_time(&self) -> Duration {
        self.epoch_time
    }
    /// The duration of all epochs.
    pub fn total_time(&self) -> Duration {
        self.total_time
    }
    /// The training stats of the last epoch.
    pub fn train(&self) -> &Stats {
        &self.train
    }
    /// The test stats of the last epoch.
    pub fn test(&self) -> &Stats {
        &self.test
    }
}

/// Summerizes the trainer.
pub trait Summarize {
    /// Returns a summary.
    fn summarize(&self) -> Summary;
}

/// The losses of one epoch, as written to the history file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EpochRecord {
    /// The epoch, starting at 1.
    pub epoch: usize,
    /// The mean training loss.
    pub train_loss: f32,
    /// The mean test loss.
    pub test_loss: f32,
    /// Seconds taken by the epoch.
    pub elapsed_secs: f64,
}

impl From<&Summary> for EpochRecord {
    fn from(summary: &Summary) -> Self {
        Self {
            epoch: summary.epoch,
            train_loss: summary.train.mean_loss(),
            test_loss: summary.test.mean_loss(),
            elapsed_secs: summary.epoch_time.as_secs_f64(),
        }
    }
}
