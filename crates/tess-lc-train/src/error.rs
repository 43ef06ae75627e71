//! Error types for the light-curve autoencoder pipeline.
//!
//! ## Hierarchy
//!
//! ```text
//! TrainError (top-level)
//! ├── ConfigError        (config validation / file loading)
//! ├── ArchitectureError  (blueprint construction against a concrete input)
//! └── SignalError        (preprocessing, re-exported from tess-lc-signal)
//! ```

use std::path::PathBuf;

use tess_lc_signal::SignalError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// TrainResult
// ---------------------------------------------------------------------------

/// Convenient `Result` alias used by orchestration-level functions.
pub type TrainResult<T> = Result<T, TrainError>;

// ---------------------------------------------------------------------------
// TrainError
// ---------------------------------------------------------------------------

/// Top-level error type for model construction and training.
///
/// Lower-level functions in [`crate::config`] and [`crate::architecture`]
/// return their own error types which are coerced into `TrainError` via
/// [`From`].
#[derive(Debug, Error)]
pub enum TrainError {
    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The configuration cannot be realised for the given input shape.
    #[error("Architecture error: {0}")]
    Architecture(#[from] ArchitectureError),

    /// A preprocessing error.
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The training set holds no objects.
    #[error("Training set is empty")]
    EmptyDataset,

    /// A shape mismatch was detected between two tensors.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// An input the model needs was not supplied (or one it cannot use was).
    #[error("Missing input: {0}")]
    MissingInput(&'static str),

    /// The loss became NaN or infinite.
    #[error("Training diverged: non-finite loss at epoch {epoch}, batch {batch}")]
    Diverged {
        /// Zero-based epoch index.
        epoch: usize,
        /// Zero-based mini-batch index within the epoch.
        batch: usize,
    },

    /// A training step failed.
    #[error("Training step failed: {0}")]
    TrainingStep(String),
}

impl TrainError {
    /// Construct a [`TrainError::TrainingStep`].
    pub fn training_step<S: Into<String>>(msg: S) -> Self {
        TrainError::TrainingStep(msg.into())
    }

    /// Construct a [`TrainError::ShapeMismatch`].
    pub fn shape_mismatch(expected: Vec<usize>, actual: Vec<usize>) -> Self {
        TrainError::ShapeMismatch { expected, actual }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors produced when loading or validating an [`ArchitectureConfig`].
///
/// [`ArchitectureConfig`]: crate::config::ArchitectureConfig
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// A configuration file could not be read or written.
    #[error("Cannot access config file `{path}`: {source}")]
    FileRead {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration file contains malformed JSON or lacks a required key.
    #[error("Cannot parse config file `{path}`: {source}")]
    ParseError {
        /// Path that was being parsed.
        path: PathBuf,
        /// Underlying JSON parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    /// Construct a [`ConfigError::InvalidValue`].
    pub fn invalid_value<S: Into<String>>(field: &'static str, reason: S) -> Self {
        ConfigError::InvalidValue { field, reason: reason.into() }
    }
}

// ---------------------------------------------------------------------------
// ArchitectureError
// ---------------------------------------------------------------------------

/// Errors raised while turning a valid config into a concrete blueprint.
///
/// These depend on the input (series length, side features, class count)
/// and so cannot be caught by [`crate::config::ArchitectureConfig::validate`].
#[derive(Debug, Error)]
pub enum ArchitectureError {
    /// A series length is not a multiple of the downsampling factor.
    #[error("{what} length {length} is not divisible by {factor} (2^{stages} downsampling stages)")]
    IndivisibleLength {
        /// `"input"` or `"segment N"`.
        what: String,
        /// Offending length.
        length: usize,
        /// Required factor.
        factor: usize,
        /// Number of encoder stages.
        stages: usize,
    },

    /// Split-mode gap indices do not fit the input.
    #[error("Orbit gap [{start}, {end}) does not fit an input of length {input_len}")]
    InvalidOrbitGap {
        /// First excluded index.
        start: usize,
        /// First index of the second segment.
        end: usize,
        /// Input length.
        input_len: usize,
    },

    /// A dimension collapsed to zero.
    #[error("Stage `{stage}` produces an empty output")]
    EmptyStage {
        /// Stage description.
        stage: String,
    },

    /// A classification head needs at least two classes.
    #[error("Classifier needs at least 2 classes, got {0}")]
    TooFewClasses(usize),
}
