use clap::Parser;
use mnist_vae::{
    artifacts::Artifacts, config::Options, dataset::mnist::Mnist, device,
    learn::trainer::VaeTrainer, logging, result::Result,
};
use tracing::info;

fn main() -> Result<()> {
    logging::init()?;
    let mut options = Options::parse();
    info!("Initialization...");
    let seed = *options.seed.get_or_insert_with(rand::random);
    info!("seed = {seed}");
    let device = device::select(options.cuda)?;

    info!("Creating folders...");
    let artifacts = Artifacts::create(&options.data_dir, &options.results_dir)?;
    artifacts.write_config(&options)?;

    info!("Loading MNIST...");
    let mnist = Mnist::builder()
        .path(&options.data_dir)
        .kind(options.dataset)
        .download(!options.no_download)
        .build()?;

    let mut trainer = VaeTrainer::builder(device)
        .topology(options.topology)
        .loss(options.loss)
        .learning_rate(options.learning_rate)
        .batch_size(options.batch_size)
        .seed(seed)
        .build()?;
    trainer.fit(mnist.train(), mnist.test(), &artifacts, options.epochs)?;
    Ok(())
}
