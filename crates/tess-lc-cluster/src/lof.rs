//! Local outlier factor.
//!
//! For each point `p` with neighbour set `N_k(p)` (its `k` nearest other
//! points, ties broken by row index):
//!
//! ```text
//! reach_k(p, o) = max(k_distance(o), d(p, o))
//! lrd(p)        = 1 / (mean_{o in N_k(p)} reach_k(p, o) + 1e-10)
//! lof(p)        = mean_{o in N_k(p)} lrd(o) / lrd(p)
//! ```
//!
//! Scores near 1 are inliers; larger scores mark sparser neighbourhoods.

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::{check_points, pairwise};
use crate::{ClusterError, Result};

const LRD_EPSILON: f64 = 1e-10;

/// LOF parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LofConfig {
    /// Neighbourhood size `k`.
    pub n_neighbors: usize,
}

impl Default for LofConfig {
    fn default() -> Self {
        LofConfig { n_neighbors: 20 }
    }
}

/// One LOF score per row of `points`.
///
/// Fails with [`ClusterError::InsufficientNeighbors`] unless there are at
/// least `k + 1` rows.
pub fn local_outlier_factor(points: ArrayView2<'_, f32>, k: usize) -> Result<Array1<f64>> {
    if k == 0 {
        return Err(ClusterError::invalid("n_neighbors", "must be >= 1"));
    }
    check_points(points)?;
    let n = points.nrows();
    if n < k + 1 {
        return Err(ClusterError::InsufficientNeighbors { k, n });
    }

    let dist = pairwise(points);
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
            others.sort_by(|&a, &b| dist[[i, a]].total_cmp(&dist[[i, b]]).then(a.cmp(&b)));
            others.truncate(k);
            others
        })
        .collect();
    let k_distance: Vec<f64> = (0..n).map(|i| dist[[i, neighbours[i][k - 1]]]).collect();

    let lrd: Vec<f64> = (0..n)
        .map(|i| {
            let reach: f64 = neighbours[i]
                .iter()
                .map(|&o| k_distance[o].max(dist[[i, o]]))
                .sum::<f64>()
                / k as f64;
            1.0 / (reach + LRD_EPSILON)
        })
        .collect();

    let scores = Array1::from_shape_fn(n, |i| {
        neighbours[i].iter().map(|&o| lrd[o]).sum::<f64>() / k as f64 / lrd[i]
    });
    debug!(objects = n, k, max = scores.iter().cloned().fold(f64::MIN, f64::max), "lof");
    Ok(scores)
}

/// Row indices of the extreme scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlierRanking {
    /// Highest scores first.
    pub most_anomalous: Vec<usize>,
    /// Lowest scores first.
    pub least_anomalous: Vec<usize>,
}

/// The `n` highest and `n` lowest scoring rows (fewer if there are not
/// enough scores). Equal scores keep row order.
pub fn rank_outliers(scores: &Array1<f64>, n: usize) -> OutlierRanking {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let take = n.min(order.len());
    let least_anomalous = order[..take].to_vec();
    let mut descending = order;
    descending.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    OutlierRanking {
        most_anomalous: descending[..take].to_vec(),
        least_anomalous,
    }
}
