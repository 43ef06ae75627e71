//! tess-lc CLI
//!
//! Command-line front end for the light-curve pipeline: preprocessing,
//! autoencoder training, latent-space clustering and catalog lookups.
//!
//! # Usage
//!
//! ```bash
//! # Smoke-test the pipeline on synthetic flat/bump curves
//! tess-lc train --synthetic 400 --output runs/synthetic
//!
//! # Train on real light curves with a JSON configuration
//! tess-lc train --config ae.json --input sector20.json --interpolate --output runs/s20
//!
//! # Cluster the learned latent space
//! tess-lc cluster --latent runs/s20/latent.json dbscan --eps 2.2 --min-samples 18
//!
//! # Annotate objects from the TESS Input Catalog
//! tess-lc catalog 261136679 38846515
//! ```

use clap::{Parser, Subcommand};

pub mod catalog;
pub mod cluster;
pub mod io;
pub mod train;

/// TESS light-curve autoencoder command line interface
#[derive(Parser, Debug)]
#[command(name = "tess-lc")]
#[command(author, version, about = "Latent-space analysis of TESS light curves")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Preprocess light curves and train an autoencoder
    Train(train::TrainArgs),

    /// Cluster or score a latent space
    Cluster(cluster::ClusterArgs),

    /// Look up objects in the TESS Input Catalog
    Catalog(catalog::CatalogArgs),

    /// Display version information
    Version,
}
