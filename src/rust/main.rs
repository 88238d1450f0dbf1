use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use posture::{load_dataset, ServiceConfig, TrainConfig, Trainer};

const REPORT_FILE: &str = "training_report.json";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model from a tree of labeled recordings and save the bundle
    Train(TrainArgs),
    /// Serve predictions from a saved bundle
    Serve(ServiceConfig),
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Root directory searched recursively for .csv recordings
    #[arg(long)]
    data: PathBuf,

    /// Directory the artifact bundle is written to
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Share of each class held out for the final evaluation
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Share of the training rows used for per-epoch validation
    #[arg(long)]
    validation_fraction: Option<f64>,
}

impl TrainArgs {
    fn config(&self) -> TrainConfig {
        let defaults = TrainConfig::default();
        TrainConfig {
            epochs: self.epochs.unwrap_or(defaults.epochs),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            seed: self.seed.unwrap_or(defaults.seed),
            test_fraction: self.test_fraction.unwrap_or(defaults.test_fraction),
            validation_fraction: self.validation_fraction.unwrap_or(defaults.validation_fraction),
            ..defaults
        }
    }
}

fn train(args: TrainArgs) -> Result<()> {
    let start = Instant::now();
    info!("=== Loading recordings from {:?} ===", args.data);

    let (dataset, load) = load_dataset(&args.data)
        .with_context(|| format!("Failed to load recordings from {}", args.data.display()))?;
    info!(
        "Read {} files ({} failed): {} rows accepted, {} skipped",
        load.files_read, load.files_failed, load.rows_accepted, load.rows_skipped
    );
    for (label, count) in dataset.class_counts() {
        info!("  {:<14} {:>6} samples", label, count);
    }

    let trainer = Trainer::builder().with_config(args.config()).build()?;
    let outcome = trainer.fit(&dataset).context("Training failed")?;

    outcome
        .bundle
        .save(&args.out)
        .with_context(|| format!("Failed to save bundle to {}", args.out.display()))?;
    let report_path = args.out.join(REPORT_FILE);
    fs::write(&report_path, serde_json::to_vec_pretty(&outcome.report)?)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    println!("Bundle {} written to {}", outcome.bundle.bundle_id(), args.out.display());
    println!("Test accuracy: {:.2}%", outcome.report.test_accuracy * 100.0);
    println!("{}", outcome.report.confusion);
    info!("=== Done in {:.2?} ===", start.elapsed());
    Ok(())
}

async fn serve(config: ServiceConfig) -> Result<()> {
    info!("=== Starting posture service ===");
    info!("Artifacts: {:?}", config.artifacts_dir);
    posture::serve(&config)
        .await
        .with_context(|| format!("Could not serve bundle from {}", config.artifacts_dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    posture::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => train(args),
        Command::Serve(config) => serve(config).await,
    }
}
