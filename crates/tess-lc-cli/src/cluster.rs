//! `cluster` subcommand: analyses over an exported latent space.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use tess_lc_cluster::{
    dbscan, dbscan_sweep, extrema_indices, kmeans, local_outlier_factor, rank_outliers,
    ClusterLabel, ClusterSummary, DbscanConfig, KMeansConfig, LofConfig, OutlierRanking,
    SweepEntry,
};

use crate::io::{emit, read_json, LatentFile};

/// Arguments for the cluster command
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Latent JSON file written by `tess-lc train`
    #[arg(short, long, value_name = "FILE")]
    pub latent: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Analysis to run
    #[command(subcommand)]
    pub command: ClusterCommand,
}

/// Latent-space analyses
#[derive(Subcommand, Debug, Clone)]
pub enum ClusterCommand {
    /// Density-based clustering
    Dbscan {
        /// Neighbourhood radius
        #[arg(long, default_value_t = 2.2)]
        eps: f32,
        /// Neighbours (self included) that make a core point
        #[arg(long, default_value_t = 18)]
        min_samples: usize,
    },

    /// Centroid-based clustering
    Kmeans {
        /// Number of clusters
        #[arg(short = 'k', long, default_value_t = 4)]
        clusters: usize,
        /// Lloyd iterations per restart
        #[arg(long, default_value_t = 700)]
        max_iter: usize,
        /// Restarts
        #[arg(long, default_value_t = 20)]
        n_init: usize,
        /// Seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Local outlier factor scores
    Lof {
        /// Neighbourhood size
        #[arg(short = 'k', long, default_value_t = 20)]
        neighbors: usize,
        /// Report this many most and least anomalous objects
        #[arg(long, default_value_t = 20)]
        top: usize,
    },

    /// DBSCAN over a grid of parameters
    Sweep {
        /// Radii to try
        #[arg(long, value_delimiter = ',', default_values_t = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0])]
        eps: Vec<f32>,
        /// Minimum neighbourhood sizes to try
        #[arg(long, value_delimiter = ',', default_values_t = [2, 5, 10, 15, 20])]
        min_samples: Vec<usize>,
    },

    /// Objects at the extremes of two latent features
    Extrema {
        /// First feature column
        #[arg(long, default_value_t = 0)]
        feat1: usize,
        /// Second feature column
        #[arg(long, default_value_t = 1)]
        feat2: usize,
    },
}

/// Labels keyed by object id.
#[derive(Debug, Serialize)]
pub struct LabelReport {
    /// Object identifiers.
    pub ids: Vec<u64>,
    /// Cluster per object; `null` is noise.
    pub labels: Vec<ClusterLabel>,
    /// Cluster sizes.
    pub summary: ClusterSummary,
}

/// Scores keyed by object id.
#[derive(Debug, Serialize)]
pub struct LofReport {
    /// Object identifiers.
    pub ids: Vec<u64>,
    /// Outlier score per object.
    pub scores: Vec<f64>,
    /// Ids of the highest scoring objects, highest first.
    pub most_anomalous: Vec<u64>,
    /// Ids of the lowest scoring objects, lowest first.
    pub least_anomalous: Vec<u64>,
}

/// Execute the cluster command.
pub fn execute(args: ClusterArgs) -> Result<()> {
    let file: LatentFile = read_json(&args.latent)?;
    let points = file.to_array()?;
    info!(objects = points.nrows(), dims = points.ncols(), "latent space loaded");
    let out = args.output.as_deref();

    match args.command {
        ClusterCommand::Dbscan { eps, min_samples } => {
            let labels = dbscan(points.view(), &DbscanConfig { eps, min_samples })?;
            let summary = ClusterSummary::from_labels(&labels);
            info!(clusters = summary.num_clusters, noise = summary.noise, "dbscan done");
            let report = LabelReport {
                ids: file.ids,
                labels,
                summary,
            };
            emit(out, &report)
        }
        ClusterCommand::Kmeans { clusters, max_iter, n_init, seed } => {
            let config = KMeansConfig {
                n_clusters: clusters,
                max_iter,
                n_init,
                seed,
                ..Default::default()
            };
            let result = kmeans(points.view(), &config)?;
            info!(inertia = result.inertia, iterations = result.iterations, "k-means done");
            let summary = ClusterSummary::from_assignments(&result.labels);
            let labels = result.labels.into_iter().map(Some).collect();
            let report = LabelReport {
                ids: file.ids,
                labels,
                summary,
            };
            emit(out, &report)
        }
        ClusterCommand::Lof { neighbors, top } => {
            let config = LofConfig { n_neighbors: neighbors };
            let scores = local_outlier_factor(points.view(), config.n_neighbors)?;
            let OutlierRanking {
                most_anomalous,
                least_anomalous,
            } = rank_outliers(&scores, top);
            let to_ids = |rows: Vec<usize>| -> Vec<u64> {
                rows.into_iter().map(|r| file.ids[r]).collect()
            };
            let report = LofReport {
                most_anomalous: to_ids(most_anomalous),
                least_anomalous: to_ids(least_anomalous),
                scores: scores.to_vec(),
                ids: file.ids.clone(),
            };
            emit(out, &report)
        }
        ClusterCommand::Sweep { eps, min_samples } => {
            let entries: Vec<SweepEntry> = dbscan_sweep(points.view(), &eps, &min_samples)?;
            for e in &entries {
                info!(
                    eps = e.eps,
                    min_samples = e.min_samples,
                    clusters = e.num_clusters,
                    noise = e.num_noise,
                    "sweep"
                );
            }
            emit(out, &entries)
        }
        ClusterCommand::Extrema { feat1, feat2 } => {
            let rows = extrema_indices(points.view(), feat1, feat2)?;
            let ids: Vec<u64> = rows.into_iter().map(|r| file.ids[r]).collect();
            emit(out, &ids)
        }
    }
}
