//! `train` subcommand: preprocess, fit, and export the latent space.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use ndarray::{concatenate, Array2, Axis};
use tracing::info;

use tess_lc_signal::{interpolate_gaps, normalize, split_train_test, GapConfig};
use tess_lc_train::dataset::{signal_data, SyntheticConfig, TrainingData};
use tess_lc_train::{ArchitectureConfig, Model, Trainer};

use crate::io::{read_json, write_json, LatentFile, LightCurveFile};

/// Arguments for the train command
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// JSON architecture configuration (defaults when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Light-curve JSON file
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with = "synthetic",
        required_unless_present = "synthetic"
    )]
    pub input: Option<PathBuf>,

    /// Train on N synthetic flat/bump curves instead of an input file
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    /// Samples per synthetic curve
    #[arg(long, default_value_t = 100)]
    pub input_dim: usize,

    /// Fraction of objects used for training
    #[arg(long, default_value_t = 0.9)]
    pub ratio: f64,

    /// Sigma-clip and fill gaps before training
    #[arg(long)]
    pub interpolate: bool,

    /// Divide each curve by its median and subtract one
    #[arg(long)]
    pub normalize: bool,

    /// Feed each curve's RMS through a side channel
    #[arg(long)]
    pub rms_side_channel: bool,

    /// Train a classifier on the labels instead of reconstructing the input
    #[arg(long)]
    pub supervised: bool,

    /// Override the configured number of epochs
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Override the configured seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output directory
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,
}

/// Prepared tensors plus the object id behind each row (train rows first).
struct Prepared {
    data: TrainingData,
    ids: Vec<u64>,
}

/// Execute the train command.
pub fn execute(args: TrainArgs) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ArchitectureConfig::from_json(path)?
        }
        None => ArchitectureConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.validate().context("configuration validation failed")?;

    let prepared = match (&args.input, args.synthetic) {
        (Some(path), _) => prepare_file(path, &args, &config)?,
        (None, Some(n)) => prepare_synthetic(n, &args, &config)?,
        (None, None) => bail!("either --input or --synthetic is required"),
    };
    let mut data = prepared.data;
    if !args.supervised {
        data = data.without_labels();
    }
    if args.rms_side_channel {
        data = data.with_rms_side_channel()?;
    }

    info!(
        train = data.num_train(),
        test = data.num_test(),
        length = data.series_len(),
        supervised = data.num_classes().is_some(),
        side_channel = data.side_features().is_some(),
        "data prepared"
    );

    let out = Trainer::new(config.clone()).run(&data)?;
    if let Some(last) = out.history.epochs.last() {
        info!("{}", last.summary());
    }

    let latent = encode_all(&out.model, &data)?;
    let dir = &args.output;
    config.to_json(&dir.join("config.json"))?;
    write_json(&dir.join("history.json"), &out.history)?;
    write_json(&dir.join("latent.json"), &LatentFile::new(prepared.ids, &latent)?)?;
    std::fs::write(dir.join("model.txt"), out.model.summary())
        .with_context(|| format!("writing {}", dir.join("model.txt").display()))?;
    info!(
        parameters = out.model.num_parameters(),
        objects = latent.nrows(),
        "wrote run to {}",
        dir.display()
    );
    Ok(())
}

fn prepare_file(path: &Path, args: &TrainArgs, config: &ArchitectureConfig) -> Result<Prepared> {
    info!("Loading light curves from {}", path.display());
    let file: LightCurveFile = read_json(path)?;
    let (mut batch, labels) = file.into_batch()?;

    if args.interpolate {
        let (filled, report) = interpolate_gaps(&batch, &GapConfig::default())?;
        info!(
            clipped = report.clipped,
            linear = report.linear_filled,
            spline = report.spline_filled,
            dropped = report.dropped_indices.len(),
            "gaps repaired"
        );
        batch = filled;
    }
    if args.normalize {
        batch = batch.with_flux(normalize(batch.flux())?)?;
    }

    let split = split_train_test(&batch, config.num_conv_layers, args.ratio, labels.as_deref())?;
    let ids = split
        .train_indices
        .iter()
        .chain(&split.test_indices)
        .map(|&row| batch.ids()[row])
        .collect();
    Ok(Prepared { data: TrainingData::from_split(&split), ids })
}

fn prepare_synthetic(n: usize, args: &TrainArgs, config: &ArchitectureConfig) -> Result<Prepared> {
    if !(args.ratio > 0.0 && args.ratio < 1.0) {
        bail!("--ratio must be in (0, 1), got {}", args.ratio);
    }
    let training_size = ((n as f64 * args.ratio) as usize) / 2 * 2;
    let syn_config = SyntheticConfig {
        training_size,
        test_size: n - training_size,
        input_dim: args.input_dim,
        seed: config.seed,
        ..Default::default()
    };
    info!(train = training_size, test = n - training_size, "generating synthetic curves");
    let syn = signal_data(&syn_config)?;
    Ok(Prepared {
        data: syn.into_training_data(),
        ids: (0..n as u64).collect(),
    })
}

/// Latent vectors for the training rows followed by the test rows.
fn encode_all(model: &Model, data: &TrainingData) -> Result<Array2<f32>> {
    let train = model.encode(data.x_train.view(), data.side_train.as_ref().map(|s| s.view()))?;
    if data.num_test() == 0 {
        return Ok(train);
    }
    let test = model.encode(data.x_test.view(), data.side_test.as_ref().map(|s| s.view()))?;
    Ok(concatenate(Axis(0), &[train.view(), test.view()])?)
}
