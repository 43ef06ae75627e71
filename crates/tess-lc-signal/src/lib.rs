//! TESS light-curve preprocessing.
//!
//! This crate turns raw flux arrays into tensors the autoencoder can train
//! on. It owns every step that happens before a model exists:
//!
//! - **Batch container**: [`LightCurveBatch`] pairs a shared, strictly
//!   increasing time axis with one flux row per object.
//! - **Scaling**: [`normalize`] (median-relative flux), [`standardize`]
//!   (zero mean, unit variance) and [`rms`] (side-channel feature).
//! - **Gap repair**: [`interpolate_gaps`] sigma-clips outliers, fills short
//!   gaps linearly, fills medium gaps with a cubic spline and drops every
//!   time index that is still missing in any object.
//! - **Partitioning**: [`split_train_test`] truncates the time axis to a
//!   multiple of the network's downsampling factor and splits objects into
//!   train/test tensors, optionally stratified by class.
//!
//! # Example
//!
//! ```rust
//! use ndarray::{array, Array1};
//! use tess_lc_signal::{normalize, split_train_test, LightCurveBatch};
//!
//! let time = Array1::linspace(0.0, 1.0, 10);
//! let flux = array![
//!     [10.0_f32, 11.0, 9.0, 10.0, 10.0, 10.5, 9.5, 10.0, 10.0, 10.0],
//!     [20.0_f32, 21.0, 19.0, 20.0, 20.0, 20.5, 19.5, 20.0, 20.0, 20.0],
//! ];
//! let batch = LightCurveBatch::new(time, flux).unwrap();
//! let batch = batch.with_flux(normalize(batch.flux()).unwrap()).unwrap();
//!
//! let split = split_train_test(&batch, 2, 0.5, None).unwrap();
//! assert_eq!(split.x_train.shape(), &[1, 10, 1]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod batch;
pub mod interpolate;
pub mod normalize;
pub mod sigma_clip;
pub mod spline;
pub mod split;

pub use batch::LightCurveBatch;
pub use interpolate::{interpolate_gaps, GapConfig, GapReport};
pub use normalize::{normalize, rms, standardize};
pub use sigma_clip::{median, sigma_clip, SigmaClipConfig};
pub use spline::CubicSpline;
pub use split::{split_train_test, truncated_length, TrainTestSplit};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for preprocessing operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Unified error type for preprocessing operations
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The batch contains no objects or no time samples.
    #[error("Light-curve batch is empty")]
    EmptyBatch,

    /// Flux rows and the time axis disagree in length.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// The time axis is not strictly increasing.
    #[error("Time axis is not strictly increasing at index {index}")]
    NonMonotonicTime {
        /// First index whose timestamp is not greater than its predecessor.
        index: usize,
    },

    /// An object's median flux is exactly zero, so it cannot be normalized.
    #[error("Object {object} has zero median flux")]
    ZeroMedian {
        /// Row index of the offending object.
        object: usize,
    },

    /// An object's flux has zero variance, so it cannot be standardized.
    #[error("Object {object} has zero variance")]
    ZeroVariance {
        /// Row index of the offending object.
        object: usize,
    },

    /// A flux value that must be finite is NaN or infinite.
    #[error("Object {object} contains a non-finite value at index {index}")]
    NonFinite {
        /// Row index of the offending object.
        object: usize,
        /// Time index of the offending value.
        index: usize,
    },

    /// Train/test ratio outside the open interval (0, 1).
    #[error("Train/test ratio must be in (0, 1), got {ratio}")]
    InvalidRatio {
        /// The rejected ratio.
        ratio: f64,
    },

    /// A parameter has an invalid value.
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidParameter {
        /// Name of the parameter.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },

    /// The series is shorter than one downsampling block.
    #[error("Series of length {length} is shorter than one block of {block} samples")]
    TooShort {
        /// Length before truncation.
        length: usize,
        /// Required block size (`2^(num_conv_layers/2)`).
        block: usize,
    },

    /// Class labels do not line up with the objects in the batch.
    #[error("Got {labels} class labels for {objects} objects")]
    LabelCountMismatch {
        /// Number of labels supplied.
        labels: usize,
        /// Number of objects in the batch.
        objects: usize,
    },

    /// A partition ended up without any objects.
    #[error("The {partition} partition is empty")]
    EmptyPartition {
        /// `"train"` or `"test"`.
        partition: &'static str,
    },

    /// Gap repair left no time index that is valid for every object.
    #[error("Every time index was dropped during gap interpolation")]
    AllSamplesDropped,
}

impl SignalError {
    /// Construct a [`SignalError::InvalidParameter`].
    pub fn invalid<S: Into<String>>(field: &'static str, reason: S) -> Self {
        SignalError::InvalidParameter { field, reason: reason.into() }
    }

    /// Construct a [`SignalError::ShapeMismatch`].
    pub fn shape_mismatch(expected: Vec<usize>, actual: Vec<usize>) -> Self {
        SignalError::ShapeMismatch { expected, actual }
    }
}
