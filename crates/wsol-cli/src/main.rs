use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use wsol_rs::{evaluate_localization, DatasetName, EvaluationMode};

#[derive(Parser)]
#[command(name = "wsol-eval")]
#[command(
    about = "WSOL evaluation tool: compute MaxBoxAcc and PxAP localization metrics from score maps"
)]
struct Cli {
    /// Directory containing one score map per image, at {image_id}.npy
    #[arg(long, default_value = "train_log/scoremaps/")]
    scoremap_root: PathBuf,

    /// Directory containing image_ids.txt, image_sizes.txt, and localization.txt
    #[arg(long, default_value = "metadata/")]
    metadata_root: PathBuf,

    /// Directory that mask paths in localization.txt are relative to
    #[arg(long, default_value = "dataset/")]
    mask_root: PathBuf,

    /// Dataset to evaluate: CUB, ILSVRC, or OpenImages
    #[arg(long)]
    dataset_name: String,

    /// Dataset split being evaluated
    #[arg(long, default_value = "test")]
    split: String,

    /// Spacing of the score-map threshold sweep, in (0, 1]
    #[arg(long, default_value_t = 0.01)]
    threshold_interval: f64,

    /// Emit the result as a single JSON object on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct EvalReport {
    dataset: String,
    split: String,
    metric: &'static str,
    value: f64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let dataset: DatasetName = cli.dataset_name.parse()?;
    let value = evaluate_localization(
        &cli.scoremap_root,
        &cli.metadata_root,
        &cli.mask_root,
        dataset,
        &cli.split,
        cli.threshold_interval,
    )
    .context("Evaluation failed")?;

    let metric = match dataset.evaluation_mode() {
        EvaluationMode::Boxes => "MaxBoxAcc",
        EvaluationMode::Masks => "PxAP",
    };
    if cli.json {
        let report = EvalReport {
            dataset: dataset.to_string(),
            split: cli.split,
            metric,
            value,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}: {}", metric, value);
    }

    Ok(())
}
