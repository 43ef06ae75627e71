//! # TESS light-curve autoencoders
//!
//! This crate builds and trains the convolutional autoencoders used to learn
//! latent representations of TESS light curves. It includes configuration
//! management, the architecture builder, a small `ndarray` network engine,
//! loss functions, per-epoch metrics, synthetic datasets and the training
//! loop orchestrator.
//!
//! ## Architecture
//!
//! ```text
//! ArchitectureConfig ──► Blueprint (typed stages) ──► Model (graph + layers)
//!       │                                               │
//!       │                                           Trainer::fit
//!       │                                               │
//!       │                                TrainingData (tess_lc_signal split
//!       │                                 | signal_data / no_signal_data)
//!       │
//!       └──► optimizer / losses / metrics
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tess_lc_train::config::ArchitectureConfig;
//! use tess_lc_train::dataset::{signal_data, SyntheticConfig, TrainingData};
//! use tess_lc_train::trainer::Trainer;
//!
//! let config = ArchitectureConfig::default();
//! config.validate().expect("config is valid");
//!
//! let syn = signal_data(&SyntheticConfig::default()).unwrap();
//! let data = TrainingData::unsupervised(syn.x_train, syn.x_test);
//!
//! let out = Trainer::new(config).run(&data).unwrap();
//! let latent = out.model.encode(data.x_train.view(), None).unwrap();
//! println!("latent space: {:?}", latent.shape());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod architecture;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod layers;
pub mod losses;
pub mod metrics;
pub mod model;
pub mod optimizer;
pub mod trainer;

// Convenient re-exports at the crate root.
pub use architecture::{Blueprint, BuildOptions, Head, Stage};
pub use config::{Activation, ArchitectureConfig, LossKind, OptimizerKind, Variant};
pub use dataset::{no_signal_data, signal_data, SyntheticConfig, SyntheticData, TrainingData};
pub use error::{ArchitectureError, ConfigError, TrainError, TrainResult};
pub use metrics::{EpochMetrics, History};
pub use model::{LayerOutput, Model};
pub use trainer::{TrainOutput, Trainer};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
