//! Command line options.
use crate::{
    dataset::mnist::MnistKind,
    learn::{criterion::LossKind, neural_network::Topology},
};
use clap::{ArgAction, Parser};
use serde::Serialize;
use std::path::PathBuf;

/// Trains a variational autoencoder on MNIST.
#[derive(Clone, Debug, Parser, Serialize)]
#[command(version, about)]
pub struct Options {
    /// The number of epochs.
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,
    /// The batch size for training and testing.
    #[arg(long, default_value_t = 1024)]
    pub batch_size: usize,
    /// Train on CUDA device 0 if available.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub cuda: bool,
    /// The reconstruction loss.
    #[arg(long, value_enum, default_value_t)]
    pub loss: LossKind,
    /// The encoder topology.
    #[arg(long, value_enum, default_value_t)]
    pub topology: Topology,
    /// The Adam learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,
    /// Seeds initialization, shuffling and sampling. Random if not provided.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Where the dataset is stored.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
    /// Where samples, reconstructions, weights and the history are written.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
    /// The dataset.
    #[arg(long, value_enum, default_value_t)]
    pub dataset: MnistKind,
    /// Fail instead of downloading missing dataset files.
    #[arg(long)]
    pub no_download: bool,
}
