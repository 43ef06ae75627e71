//! Small reductions over latent spaces and labelings.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::dbscan::ClusterLabel;
use crate::distance::check_points;
use crate::{ClusterError, Result};

// ----------------------------------------------------------------------------
// Extrema
// ----------------------------------------------------------------------------

/// Rows at the extremes of two latent features: the 3 largest and 2
/// smallest values of `feat1`, the 2 largest and 2 smallest of `feat2`.
/// Returned sorted and de-duplicated.
pub fn extrema_indices(
    features: ArrayView2<'_, f32>,
    feat1: usize,
    feat2: usize,
) -> Result<Vec<usize>> {
    check_points(features)?;
    let width = features.ncols();
    for feature in [feat1, feat2] {
        if feature >= width {
            return Err(ClusterError::FeatureOutOfRange { feature, features: width });
        }
    }

    let mut picked = Vec::with_capacity(9);
    for (feature, largest, smallest) in [(feat1, 3, 2), (feat2, 2, 2)] {
        let column = features.column(feature);
        let mut order: Vec<usize> = (0..column.len()).collect();
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
        picked.extend(order.iter().take(smallest));
        picked.extend(order.iter().rev().take(largest));
    }
    picked.sort_unstable();
    picked.dedup();
    Ok(picked)
}

// ----------------------------------------------------------------------------
// Confusion matrix
// ----------------------------------------------------------------------------

/// Contingency table between two labelings of the same objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix<L> {
    /// Distinct labels of the first labeling, ascending.
    pub row_labels: Vec<L>,
    /// Distinct labels of the second labeling, ascending.
    pub col_labels: Vec<L>,
    /// `counts[[i, j]]`: objects labelled `row_labels[i]` and `col_labels[j]`.
    pub counts: Array2<usize>,
}

impl<L: Ord> ConfusionMatrix<L> {
    /// Count for one label pair; zero for unseen labels.
    pub fn get(&self, row: &L, col: &L) -> usize {
        match (self.row_labels.binary_search(row), self.col_labels.binary_search(col)) {
            (Ok(i), Ok(j)) => self.counts[[i, j]],
            _ => 0,
        }
    }

    /// Total number of objects.
    pub fn total(&self) -> usize {
        self.counts.sum()
    }
}

/// Cross-tabulate `a` against `b`.
pub fn confusion_matrix<L: Ord + Clone>(a: &[L], b: &[L]) -> Result<ConfusionMatrix<L>> {
    if a.len() != b.len() {
        return Err(ClusterError::LengthMismatch { expected: a.len(), actual: b.len() });
    }
    let index = |labels: &[L]| -> BTreeMap<L, usize> {
        let mut map: BTreeMap<L, usize> = labels.iter().map(|l| (l.clone(), 0)).collect();
        for (i, v) in map.values_mut().enumerate() {
            *v = i;
        }
        map
    };
    let rows = index(a);
    let cols = index(b);
    let mut counts = Array2::zeros((rows.len(), cols.len()));
    for (x, y) in a.iter().zip(b) {
        counts[[rows[x], cols[y]]] += 1;
    }
    Ok(ConfusionMatrix {
        row_labels: rows.into_keys().collect(),
        col_labels: cols.into_keys().collect(),
        counts,
    })
}

// ----------------------------------------------------------------------------
// Cluster summary
// ----------------------------------------------------------------------------

/// Size breakdown of a clustering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Clusters, noise excluded.
    pub num_clusters: usize,
    /// Members of cluster `i` at index `i`.
    pub sizes: Vec<usize>,
    /// Objects labelled noise.
    pub noise: usize,
}

impl ClusterSummary {
    /// Summarise DBSCAN-style labels.
    pub fn from_labels(labels: &[ClusterLabel]) -> Self {
        let num_clusters = labels.iter().flatten().max().map_or(0, |&m| m + 1);
        let mut sizes = vec![0; num_clusters];
        let mut noise = 0;
        for label in labels {
            match label {
                Some(c) => sizes[*c] += 1,
                None => noise += 1,
            }
        }
        ClusterSummary { num_clusters, sizes, noise }
    }

    /// Summarise labels with no noise, e.g. from k-means.
    pub fn from_assignments(labels: &[usize]) -> Self {
        let wrapped: Vec<ClusterLabel> = labels.iter().copied().map(Some).collect();
        Self::from_labels(&wrapped)
    }
}
