//! Architecture and training configuration.
//!
//! [`ArchitectureConfig`] carries every recognised option of a run: the
//! convolutional stack, the bottleneck, the optimiser and the fit schedule.
//! It serialises to JSON with the same keys the light-curve notebooks use
//! (`num_conv_layers`, `num_filters`, `kernel_size`, `lr`, `losses`, ...).
//!
//! # Example
//!
//! ```rust
//! use tess_lc_train::config::{ArchitectureConfig, OptimizerKind};
//!
//! let cfg = ArchitectureConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.num_conv_layers, 4);
//! assert_eq!(cfg.optimizer, OptimizerKind::Adam);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Enumerated options
// ---------------------------------------------------------------------------

/// Element-wise (or, for softmax, row-wise) nonlinearity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `max(0, x)`
    Relu,
    /// Hyperbolic tangent.
    Tanh,
    /// Logistic function.
    Sigmoid,
    /// Exponential linear unit, `alpha = 1`.
    Elu,
    /// Identity.
    Linear,
    /// Normalised exponential over the feature axis.
    Softmax,
}

/// Optimiser choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// Adam with time-based learning-rate decay `lr / epochs`.
    Adam,
    /// Adadelta, no decay.
    Adadelta,
}

/// Loss function identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    /// Mean of squared errors.
    MeanSquaredError,
    /// Mean of absolute errors.
    MeanAbsoluteError,
    /// Element-wise binary cross-entropy.
    BinaryCrossentropy,
    /// Cross-entropy against one-hot rows.
    CategoricalCrossentropy,
}

/// Network topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Variant {
    /// Convolutional encoder/decoder over the whole series.
    #[default]
    Conv,
    /// Convolutional encoder/decoder run separately on the two halves of a
    /// sector, either side of the orbit gap `[start, end)`.
    Split {
        /// Excluded index range; the segments are `[0, start)` and `[end, L)`.
        orbit_gap: [usize; 2],
    },
    /// Flatten + one dense layer each way; the ablation baseline.
    Simple,
}

impl Variant {
    /// Default split positions for a 2-minute TESS sector.
    ///
    /// The first segment is 8794 samples long, which is divisible by
    /// `2^S` only for `S <= 1`. With more encoder stages the series has to
    /// be cut (or the gap moved) so that both segments divide evenly,
    /// otherwise [`Blueprint::build`](crate::architecture::Blueprint::build)
    /// fails with `IndivisibleLength`.
    pub const DEFAULT_ORBIT_GAP: [usize; 2] = [8794, 8795];
}

// ---------------------------------------------------------------------------
// ArchitectureConfig
// ---------------------------------------------------------------------------

/// Complete configuration for one autoencoder run.
///
/// Every key is required when loading from JSON except `variant` and
/// `seed`; a missing key is a [`ConfigError::ParseError`] naming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------
    /// Total number of convolutional stages, split evenly between encoder
    /// and decoder. Must be even. Default: **4**.
    pub num_conv_layers: usize,

    /// Filters per stage; encoder stage `i` uses `num_filters[i]`, decoder
    /// stage `i` uses `num_filters[num_conv_layers / 2 + i]`.
    /// Default: **[16, 32, 32, 16]**.
    pub num_filters: Vec<usize>,

    /// Kernel width per stage, indexed like `num_filters`.
    /// Default: **[3, 3, 3, 3]**.
    pub kernel_size: Vec<usize>,

    /// Hidden-stage nonlinearity. Default: **elu**.
    pub activation: Activation,

    /// Final reconstruction nonlinearity. Default: **linear**.
    pub last_activation: Activation,

    /// Bottleneck width. Default: **16**.
    pub latent_dim: usize,

    /// Dropout rate in `[0, 1)`. Default: **0.1**.
    pub dropout: f32,

    /// Topology variant. Optional in JSON. Default: **conv**.
    #[serde(default)]
    pub variant: Variant,

    // -----------------------------------------------------------------------
    // Optimisation
    // -----------------------------------------------------------------------
    /// Optimiser. Default: **adam**.
    pub optimizer: OptimizerKind,

    /// Initial learning rate. Default: **1e-3**.
    pub lr: f32,

    /// Mini-batch size. Default: **128**.
    pub batch_size: usize,

    /// Number of full passes over the training set. Default: **10**.
    pub epochs: usize,

    /// Loss identifier. Default: **mean_squared_error**.
    pub losses: LossKind,

    /// Seed for weight initialisation, shuffling and dropout masks.
    /// Optional in JSON. Default: **42**.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    42
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        ArchitectureConfig {
            num_conv_layers: 4,
            num_filters: vec![16, 32, 32, 16],
            kernel_size: vec![3, 3, 3, 3],
            activation: Activation::Elu,
            last_activation: Activation::Linear,
            latent_dim: 16,
            dropout: 0.1,
            variant: Variant::Conv,
            optimizer: OptimizerKind::Adam,
            lr: 1e-3,
            batch_size: 128,
            epochs: 10,
            losses: LossKind::MeanSquaredError,
            seed: default_seed(),
        }
    }
}

impl ArchitectureConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// # Errors
    ///
    /// [`ConfigError::FileRead`], [`ConfigError::ParseError`], or any
    /// validation error.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: ArchitectureConfig = serde_json::from_str(&contents).map_err(|source| {
            ConfigError::ParseError { path: path.to_path_buf(), source }
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write the configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Number of encoder stages (`num_conv_layers / 2`).
    pub fn num_stages(&self) -> usize {
        self.num_conv_layers / 2
    }

    /// Downsampling factor of the encoder, `2^num_stages`.
    pub fn downsample_factor(&self) -> usize {
        1usize << self.num_stages()
    }

    /// Validate every field. Called before any tensor work.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_conv_layers % 2 != 0 {
            return Err(ConfigError::invalid_value(
                "num_conv_layers",
                format!("must be even, got {}", self.num_conv_layers),
            ));
        }
        if self.variant != Variant::Simple {
            if self.num_conv_layers == 0 {
                return Err(ConfigError::invalid_value(
                    "num_conv_layers",
                    "convolutional variants need at least 2 stages",
                ));
            }
            if self.num_conv_layers > 2 * (usize::BITS as usize - 2) {
                return Err(ConfigError::invalid_value("num_conv_layers", "too many stages"));
            }
            if self.num_filters.len() < self.num_conv_layers {
                return Err(ConfigError::invalid_value(
                    "num_filters",
                    format!(
                        "need at least {} entries, got {}",
                        self.num_conv_layers,
                        self.num_filters.len()
                    ),
                ));
            }
            if self.kernel_size.len() < self.num_conv_layers {
                return Err(ConfigError::invalid_value(
                    "kernel_size",
                    format!(
                        "need at least {} entries, got {}",
                        self.num_conv_layers,
                        self.kernel_size.len()
                    ),
                ));
            }
            if self.num_filters[..self.num_conv_layers].contains(&0) {
                return Err(ConfigError::invalid_value("num_filters", "entries must be > 0"));
            }
            if self.kernel_size[..self.num_conv_layers].contains(&0) {
                return Err(ConfigError::invalid_value("kernel_size", "entries must be > 0"));
            }
        }
        if let Variant::Split { orbit_gap: [start, end] } = self.variant {
            if start == 0 || end < start {
                return Err(ConfigError::invalid_value(
                    "variant.orbit_gap",
                    format!("expected 0 < start <= end, got [{start}, {end}]"),
                ));
            }
        }
        if self.latent_dim == 0 {
            return Err(ConfigError::invalid_value("latent_dim", "must be > 0"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ConfigError::invalid_value(
                "dropout",
                format!("must be in [0, 1), got {}", self.dropout),
            ));
        }
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            return Err(ConfigError::invalid_value("lr", format!("must be > 0, got {}", self.lr)));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::invalid_value("batch_size", "must be > 0"));
        }
        if self.epochs == 0 {
            return Err(ConfigError::invalid_value("epochs", "must be > 0"));
        }
        if self.activation == Activation::Softmax {
            return Err(ConfigError::invalid_value(
                "activation",
                "softmax is reserved for the classification head",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
