//! Density-based clustering.
//!
//! Points with at least `min_samples` neighbours within `eps` (the point
//! itself included) are core points. Clusters grow from core points in row
//! order, so cluster ids are assigned in order of each cluster's first core
//! point and identical inputs always give identical labels.

use std::collections::VecDeque;

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::{check_points, pairwise};
use crate::{ClusterError, Result};

/// Cluster id of one object; `None` is noise.
pub type ClusterLabel = Option<usize>;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DbscanConfig {
    /// Neighbourhood radius.
    pub eps: f32,
    /// Neighbours (self included) that make a point core.
    pub min_samples: usize,
}

impl Default for DbscanConfig {
    fn default() -> Self {
        DbscanConfig { eps: 2.2, min_samples: 18 }
    }
}

impl DbscanConfig {
    /// Check `eps > 0` and `min_samples >= 1`.
    pub fn validate(&self) -> Result<()> {
        if !(self.eps > 0.0 && self.eps.is_finite()) {
            return Err(ClusterError::invalid("eps", format!("must be > 0, got {}", self.eps)));
        }
        if self.min_samples == 0 {
            return Err(ClusterError::invalid("min_samples", "must be >= 1"));
        }
        Ok(())
    }
}

/// Cluster the rows of `points`.
pub fn dbscan(points: ArrayView2<'_, f32>, config: &DbscanConfig) -> Result<Vec<ClusterLabel>> {
    config.validate()?;
    check_points(points)?;
    let dist = pairwise(points);
    let labels = dbscan_from_distances(&dist, config);
    debug!(
        objects = labels.len(),
        clusters = count_clusters(&labels),
        noise = labels.iter().filter(|l| l.is_none()).count(),
        "dbscan"
    );
    Ok(labels)
}

fn dbscan_from_distances(dist: &ndarray::Array2<f64>, config: &DbscanConfig) -> Vec<ClusterLabel> {
    let n = dist.nrows();
    let eps = f64::from(config.eps);
    let neighbours: Vec<Vec<usize>> = (0..n)
        .map(|i| (0..n).filter(|&j| dist[[i, j]] <= eps).collect())
        .collect();
    let core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= config.min_samples).collect();

    let mut labels: Vec<ClusterLabel> = vec![None; n];
    let mut next = 0;
    for seed in 0..n {
        if labels[seed].is_some() || !core[seed] {
            continue;
        }
        labels[seed] = Some(next);
        let mut queue: VecDeque<usize> = neighbours[seed].iter().copied().collect();
        while let Some(p) = queue.pop_front() {
            if labels[p].is_some() {
                continue;
            }
            labels[p] = Some(next);
            if core[p] {
                queue.extend(neighbours[p].iter().copied().filter(|&q| labels[q].is_none()));
            }
        }
        next += 1;
    }
    labels
}

fn count_clusters(labels: &[ClusterLabel]) -> usize {
    labels.iter().flatten().max().map_or(0, |&m| m + 1)
}

/// One cell of a [`dbscan_sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    /// Radius used.
    pub eps: f32,
    /// Minimum neighbourhood used.
    pub min_samples: usize,
    /// Clusters found, noise excluded.
    pub num_clusters: usize,
    /// Objects labelled noise.
    pub num_noise: usize,
}

/// Run DBSCAN over every `(min_samples, eps)` pair, `min_samples` outermost.
/// Distances are computed once.
pub fn dbscan_sweep(
    points: ArrayView2<'_, f32>,
    eps_values: &[f32],
    min_samples_values: &[usize],
) -> Result<Vec<SweepEntry>> {
    check_points(points)?;
    let dist = pairwise(points);
    let mut out = Vec::with_capacity(eps_values.len() * min_samples_values.len());
    for &min_samples in min_samples_values {
        for &eps in eps_values {
            let config = DbscanConfig { eps, min_samples };
            config.validate()?;
            let labels = dbscan_from_distances(&dist, &config);
            out.push(SweepEntry {
                eps,
                min_samples,
                num_clusters: count_clusters(&labels),
                num_noise: labels.iter().filter(|l| l.is_none()).count(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn blobs() -> Array2<f32> {
        array![
            [0.0, 0.0],
            [0.2, 0.0],
            [0.0, 0.2],
            [10.0, 10.0],
            [10.2, 10.0],
            [10.0, 10.2],
            [50.0, -50.0]
        ]
    }

    #[test]
    fn two_blobs_and_noise() {
        let labels = dbscan(blobs().view(), &DbscanConfig { eps: 0.5, min_samples: 3 }).unwrap();
        assert_eq!(labels, vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1), None]);
    }

    #[test]
    fn border_points_join_but_do_not_expand() {
        // Points 1 and 2 are core, 0 and 3 are border points.
        let p = array![[0.0_f32], [1.0], [2.0], [3.0]];
        let labels = dbscan(p.view(), &DbscanConfig { eps: 1.0, min_samples: 3 }).unwrap();
        assert_eq!(labels[0], Some(0));
        assert_eq!(labels[1], Some(0));
        assert_eq!(labels[2], Some(0));
        assert_eq!(labels[3], Some(0));

        let labels = dbscan(p.view(), &DbscanConfig { eps: 1.0, min_samples: 4 }).unwrap();
        assert!(labels.iter().all(Option::is_none));
    }

    #[test]
    fn min_samples_one_makes_every_point_a_cluster() {
        let labels = dbscan(blobs().view(), &DbscanConfig { eps: 0.01, min_samples: 1 }).unwrap();
        assert_eq!(labels, (0..7).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn sweep_reports_counts() {
        let sweep = dbscan_sweep(blobs().view(), &[0.5, 100.0], &[3]).unwrap();
        assert_eq!(sweep.len(), 2);
        assert_eq!((sweep[0].num_clusters, sweep[0].num_noise), (2, 1));
        assert_eq!((sweep[1].num_clusters, sweep[1].num_noise), (1, 0));
    }

    #[test]
    fn invalid_parameters() {
        assert!(dbscan(blobs().view(), &DbscanConfig { eps: 0.0, min_samples: 2 }).is_err());
        assert!(dbscan(blobs().view(), &DbscanConfig { eps: 1.0, min_samples: 0 }).is_err());
        assert!(matches!(
            dbscan(Array2::<f32>::zeros((0, 2)).view(), &DbscanConfig::default()),
            Err(ClusterError::EmptyInput)
        ));
    }
}
