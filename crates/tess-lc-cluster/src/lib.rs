//! Post-hoc analysis of learned latent spaces.
//!
//! Every function takes a latent-space matrix, one row per object, and
//! returns plain vectors and arrays for reporting or plotting:
//!
//! - [`dbscan`]: density-based clustering with a noise label, plus a
//!   parameter sweep ([`dbscan_sweep`]).
//! - [`kmeans`]: Lloyd's algorithm with k-means++ seeding and restarts.
//! - [`local_outlier_factor`]: density-ratio outlier scores, plus a ranking
//!   helper ([`rank_outliers`]).
//! - [`analysis`]: extrema selection, confusion matrices and cluster
//!   summaries.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use tess_lc_cluster::{dbscan, DbscanConfig};
//!
//! let points = array![[0.0_f32, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0], [20.0, 20.0]];
//! let labels = dbscan(points.view(), &DbscanConfig { eps: 0.5, min_samples: 2 }).unwrap();
//! assert_eq!(labels, vec![Some(0), Some(0), Some(1), Some(1), None]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod analysis;
pub mod dbscan;
mod distance;
pub mod kmeans;
pub mod lof;

pub use analysis::{confusion_matrix, extrema_indices, ClusterSummary, ConfusionMatrix};
pub use dbscan::{dbscan, dbscan_sweep, ClusterLabel, DbscanConfig, SweepEntry};
pub use kmeans::{kmeans, KMeansConfig, KMeansResult};
pub use lof::{local_outlier_factor, rank_outliers, LofConfig, OutlierRanking};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for clustering operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Unified error type for clustering operations
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// The latent matrix has no rows or no columns.
    #[error("Latent space is empty")]
    EmptyInput,

    /// A latent vector contains NaN or an infinity.
    #[error("Non-finite value in latent vector {row}")]
    NonFinite {
        /// Offending row.
        row: usize,
    },

    /// A parameter is out of range.
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Fewer points than the algorithm needs.
    #[error("Need at least {needed} points, got {got}")]
    TooFewPoints {
        /// Minimum number of points.
        needed: usize,
        /// Points supplied.
        got: usize,
    },

    /// Outlier scoring needs `k` neighbours besides each point itself.
    #[error("Local outlier factor with k = {k} needs at least {} points, got {n}", .k + 1)]
    InsufficientNeighbors {
        /// Neighbourhood size.
        k: usize,
        /// Points supplied.
        n: usize,
    },

    /// Two labelings of different length.
    #[error("Label length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length of the first labeling.
        expected: usize,
        /// Length of the second labeling.
        actual: usize,
    },

    /// A feature column index past the matrix width.
    #[error("Feature {feature} out of range for {features} features")]
    FeatureOutOfRange {
        /// Requested column.
        feature: usize,
        /// Matrix width.
        features: usize,
    },
}

impl ClusterError {
    /// Construct a [`ClusterError::InvalidParameter`].
    pub fn invalid<S: Into<String>>(name: &'static str, reason: S) -> Self {
        ClusterError::InvalidParameter { name, reason: reason.into() }
    }
}
