//! Output folders and file names.
use crate::{
    learn::{criterion::LossKind, neural_network::Topology, EpochRecord},
    result::Result,
};
use anyhow::Context;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Weights are saved every `CHECKPOINT_INTERVAL` epochs, and after the final epoch.
pub const CHECKPOINT_INTERVAL: usize = 100;

/// Creates each of `paths` and any missing parents.
pub fn create_folders<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        fs::create_dir_all(path).with_context(|| format!("creating {path:?}"))?;
    }
    Ok(())
}

/// Whether weights are saved after `epoch` of `epochs`.
pub fn is_checkpoint_epoch(epoch: usize, epochs: usize) -> bool {
    epoch % CHECKPOINT_INTERVAL == 0 || epoch == epochs
}

/// WEIGHT_{loss}_{topology}_{epoch}_{test_loss}.safetensors
pub fn checkpoint_file_name(
    loss: LossKind,
    topology: Topology,
    epoch: usize,
    test_loss: f32,
) -> String {
    format!("WEIGHT_{loss}_{topology}_{epoch}_{test_loss:02.7}.safetensors")
}

/// The epoch, zero padded to 2 digits.
pub fn epoch_file_name(epoch: usize) -> String {
    format!("{epoch:02}.png")
}

/// The folders written to during training.
///
/// ```text
/// results
/// ├── config.json
/// ├── history.json
/// ├── rand      samples decoded from a fixed latent batch, one per epoch
/// ├── test      test images above their reconstructions, one per epoch
/// └── weights   checkpoints
/// ```
#[derive(Clone, Debug)]
pub struct Artifacts {
    results: PathBuf,
    samples: PathBuf,
    reconstructions: PathBuf,
    weights: PathBuf,
}

impl Artifacts {
    /// Creates `data` and the results folders under `results` if they do not exist.
    pub fn create(data: &Path, results: &Path) -> Result<Self> {
        let artifacts = Self {
            results: results.to_owned(),
            samples: results.join("rand"),
            reconstructions: results.join("test"),
            weights: results.join("weights"),
        };
        create_folders(&[
            data,
            artifacts.samples.as_path(),
            artifacts.reconstructions.as_path(),
            artifacts.weights.as_path(),
        ])?;
        Ok(artifacts)
    }
    /// The results folder.
    pub fn results(&self) -> &Path {
        &self.results
    }
    /// The folder for samples.
    pub fn samples(&self) -> &Path {
        &self.samples
    }
    /// The folder for reconstructions.
    pub fn reconstructions(&self) -> &Path {
        &self.reconstructions
    }
    /// The folder for checkpoints.
    pub fn weights(&self) -> &Path {
        &self.weights
    }
    /// The sample image for `epoch`.
    pub fn sample_path(&self, epoch: usize) -> PathBuf {
        self.samples.join(epoch_file_name(epoch))
    }
    /// The reconstruction image for `epoch`.
    pub fn reconstruction_path(&self, epoch: usize) -> PathBuf {
        self.reconstructions.join(epoch_file_name(epoch))
    }
    /// See [`checkpoint_file_name()`].
    pub fn checkpoint_path(
        &self,
        loss: LossKind,
        topology: Topology,
        epoch: usize,
        test_loss: f32,
    ) -> PathBuf {
        self.weights
            .join(checkpoint_file_name(loss, topology, epoch, test_loss))
    }
    /// The history file.
    pub fn history_path(&self) -> PathBuf {
        self.results.join("history.json")
    }
    /// The config file.
    pub fn config_path(&self) -> PathBuf {
        self.results.join("config.json")
    }
    /// Overwrites the history file with `history`.
    pub fn write_history(&self, history: &[EpochRecord]) -> Result<()> {
        write_json(&self.history_path(), &history)
    }
    /// Overwrites the config file with `config`.
    pub fn write_config<T: Serialize>(&self, config: &T) -> Result<()> {
        write_json(&self.config_path(), config)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {path:?}"))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_epochs() {
        let epochs: Vec<usize> = (1..=250).filter(|e| is_checkpoint_epoch(*e, 250)).collect();
        assert_eq!(epochs, [100, 200, 250]);
        let epochs: Vec<usize> = (1..=300).filter(|e| is_checkpoint_epoch(*e, 300)).collect();
        assert_eq!(epochs, [100, 200, 300]);
        assert!(is_checkpoint_epoch(1, 1));
    }

    #[test]
    fn checkpoint_names() {
        assert_eq!(
            checkpoint_file_name(LossKind::Bce, Topology::Conv, 100, 104.123456789),
            "WEIGHT_BCE_CONV_100_104.1234589.safetensors",
        );
        assert_eq!(
            checkpoint_file_name(LossKind::Mse, Topology::MaxPool, 7, 0.5),
            "WEIGHT_MSE_MAXP_7_0.5000000.safetensors",
        );
    }

    #[test]
    fn epoch_names() {
        assert_eq!(epoch_file_name(1), "01.png");
        assert_eq!(epoch_file_name(99), "99.png");
        assert_eq!(epoch_file_name(100), "100.png");
    }

    #[test]
    fn create() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Artifacts::create(&dir.path().join("data"), &dir.path().join("results"))?;
        for path in [
            dir.path().join("data"),
            dir.path().join("results/rand"),
            dir.path().join("results/test"),
            dir.path().join("results/weights"),
        ] {
            assert!(path.is_dir(), "{path:?}");
        }
        assert_eq!(artifacts.sample_path(3), dir.path().join("results/rand/03.png"));
        // existing folders are kept
        Artifacts::create(&dir.path().join("data"), &dir.path().join("results"))?;
        Ok(())
    }

    #[test]
    fn history_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let artifacts = Artifacts::create(&dir.path().join("data"), dir.path())?;
        let record = EpochRecord {
            epoch: 1,
            train_loss: 2.,
            test_loss: 1.5,
            elapsed_secs: 0.25,
        };
        artifacts.write_history(&[record])?;
        let json: serde_json::Value =
            serde_json::from_reader(File::open(artifacts.history_path())?)?;
        assert_eq!(json[0]["epoch"], 1);
        assert_eq!(json[0]["test_loss"], 1.5);
        Ok(())
    }
}
