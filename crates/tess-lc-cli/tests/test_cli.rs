//! Argument parsing and a synthetic train-then-cluster run.

use clap::Parser;
use tempfile::TempDir;

use tess_lc_cli::cluster::ClusterCommand;
use tess_lc_cli::io::{read_json, write_json, LatentFile, LightCurveFile};
use tess_lc_cli::{Cli, Commands};
use tess_lc_train::{ArchitectureConfig, History};

fn small_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("ae.json");
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![2, 2],
        kernel_size: vec![3, 3],
        latent_dim: 2,
        batch_size: 8,
        epochs: 2,
        ..Default::default()
    };
    cfg.to_json(&path).unwrap();
    path
}

#[test]
fn parses_train_and_cluster_commands() {
    let cli = Cli::try_parse_from(["tess-lc", "train", "--synthetic", "40", "--epochs", "3"])
        .unwrap();
    let Commands::Train(args) = cli.command else { panic!("train expected") };
    assert_eq!(args.synthetic, Some(40));
    assert_eq!(args.epochs, Some(3));
    assert!((args.ratio - 0.9).abs() < 1e-12);

    let cli = Cli::try_parse_from([
        "tess-lc", "cluster", "--latent", "l.json", "sweep", "--eps", "0.5,1",
    ])
    .unwrap();
    let Commands::Cluster(args) = cli.command else { panic!("cluster expected") };
    let ClusterCommand::Sweep { eps, min_samples } = args.command else { panic!("sweep expected") };
    assert_eq!(eps, vec![0.5, 1.0]);
    assert_eq!(min_samples, vec![2, 5, 10, 15, 20]);
}

#[test]
fn train_needs_exactly_one_data_source() {
    assert!(Cli::try_parse_from(["tess-lc", "train"]).is_err());
    let both = ["tess-lc", "train", "--input", "a.json", "--synthetic", "10"];
    assert!(Cli::try_parse_from(both).is_err());
    assert!(Cli::try_parse_from(["tess-lc", "catalog"]).is_err());
}

#[test]
fn synthetic_run_writes_history_and_latents() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    let out = dir.path().join("run");
    let cli = Cli::try_parse_from([
        "tess-lc",
        "train",
        "--config",
        config.to_str().unwrap(),
        "--synthetic",
        "40",
        "--input-dim",
        "32",
        "--output",
        out.to_str().unwrap(),
    ])
    .unwrap();
    let Commands::Train(args) = cli.command else { panic!("train expected") };
    tess_lc_cli::train::execute(args).unwrap();

    let history: History = read_json(&out.join("history.json")).unwrap();
    assert_eq!(history.epochs.len(), 2);
    let latent: LatentFile = read_json(&out.join("latent.json")).unwrap();
    assert_eq!(latent.ids, (0..40).collect::<Vec<u64>>());
    assert_eq!(latent.to_array().unwrap().shape(), &[40, 2]);
    assert!(out.join("model.txt").exists());

    let report = dir.path().join("kmeans.json");
    let cli = Cli::try_parse_from([
        "tess-lc",
        "cluster",
        "--latent",
        out.join("latent.json").to_str().unwrap(),
        "--output",
        report.to_str().unwrap(),
        "kmeans",
        "-k",
        "2",
    ])
    .unwrap();
    let Commands::Cluster(args) = cli.command else { panic!("cluster expected") };
    tess_lc_cli::cluster::execute(args).unwrap();
    let value: serde_json::Value = read_json(&report).unwrap();
    assert_eq!(value["labels"].as_array().unwrap().len(), 40);
    assert_eq!(value["summary"]["num_clusters"], 2);
}

#[test]
fn file_input_with_labels_trains_a_classifier() {
    let dir = TempDir::new().unwrap();
    let config = small_config(&dir);
    let input = dir.path().join("curves.json");
    let time: Vec<f64> = (0..34).map(|i| i as f64 * 0.02).collect();
    let flux: Vec<Vec<Option<f32>>> = (0..12)
        .map(|obj| {
            (0..34)
                .map(|t| {
                    let bump = if obj % 2 == 1 && (14..20).contains(&t) { 0.5 } else { 0.0 };
                    Some(1.0 + bump + 0.01 * ((obj * 7 + t) % 5) as f32)
                })
                .collect()
        })
        .collect();
    let file = LightCurveFile {
        time,
        flux,
        ids: Some((100..112).collect()),
        labels: Some((0..12).map(|i| i % 2).collect()),
    };
    write_json(&input, &file).unwrap();

    let out = dir.path().join("run");
    let cli = Cli::try_parse_from([
        "tess-lc",
        "train",
        "--config",
        config.to_str().unwrap(),
        "--input",
        input.to_str().unwrap(),
        "--normalize",
        "--supervised",
        "--ratio",
        "0.5",
        "--output",
        out.to_str().unwrap(),
    ])
    .unwrap();
    let Commands::Train(args) = cli.command else { panic!("train expected") };
    tess_lc_cli::train::execute(args).unwrap();

    let latent: LatentFile = read_json(&out.join("latent.json")).unwrap();
    // Stratified: three per class in each partition, class 0 first.
    assert_eq!(latent.ids, vec![100, 102, 104, 101, 103, 105, 106, 108, 110, 107, 109, 111]);
    let history: History = read_json(&out.join("history.json")).unwrap();
    assert!(history.epochs.iter().all(|e| e.val_loss.is_some()));
}
