//! k-means clustering.
//!
//! Lloyd's algorithm with k-means++ seeding. The whole procedure is run
//! `n_init` times from one seeded generator and the run with the lowest
//! inertia (sum of squared distances to the assigned centroid) is kept.

use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::distance::{check_points, squared_euclidean};
use crate::{ClusterError, Result};

/// k-means parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of clusters.
    pub n_clusters: usize,
    /// Lloyd iterations per run.
    pub max_iter: usize,
    /// Independent restarts.
    pub n_init: usize,
    /// Stop a run once no centroid moves further than this.
    pub tol: f64,
    /// Generator seed.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        KMeansConfig {
            n_clusters: 4,
            max_iter: 700,
            n_init: 20,
            tol: 1e-4,
            seed: 42,
        }
    }
}

impl KMeansConfig {
    /// Check every count is at least one and `tol` is non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(ClusterError::invalid("n_clusters", "must be >= 1"));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::invalid("max_iter", "must be >= 1"));
        }
        if self.n_init == 0 {
            return Err(ClusterError::invalid("n_init", "must be >= 1"));
        }
        if !(self.tol >= 0.0) {
            return Err(ClusterError::invalid("tol", format!("must be >= 0, got {}", self.tol)));
        }
        Ok(())
    }
}

/// Outcome of [`kmeans`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansResult {
    /// Cluster of each row, in `0..n_clusters`.
    pub labels: Vec<usize>,
    /// `[n_clusters, features]` centroids.
    pub centroids: Array2<f32>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    /// Lloyd iterations used by the kept run.
    pub iterations: usize,
}

impl KMeansResult {
    /// Number of rows in each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

/// Partition the rows of `points` into `config.n_clusters` clusters.
pub fn kmeans(points: ArrayView2<'_, f32>, config: &KMeansConfig) -> Result<KMeansResult> {
    config.validate()?;
    check_points(points)?;
    let n = points.nrows();
    if n < config.n_clusters {
        return Err(ClusterError::TooFewPoints { needed: config.n_clusters, got: n });
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<KMeansResult> = None;
    for run in 0..config.n_init {
        let centroids = seed_centroids(points, config.n_clusters, &mut rng);
        let result = lloyd(points, centroids, config);
        debug!(run, inertia = result.inertia, iterations = result.iterations, "k-means run");
        if best.as_ref().map_or(true, |b| result.inertia < b.inertia) {
            best = Some(result);
        }
    }
    // n_init >= 1 was validated above.
    best.ok_or_else(|| ClusterError::invalid("n_init", "must be >= 1"))
}

/// k-means++: the first centroid uniformly, each next one with probability
/// proportional to the squared distance from the nearest chosen centroid.
fn seed_centroids(points: ArrayView2<'_, f32>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n, d) = points.dim();
    let mut centroids = Array2::<f64>::zeros((k, d));
    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&points.row(first).mapv(f64::from));

    let mut nearest: Vec<f64> = (0..n)
        .map(|i| squared_distance(points.row(i), centroids.row(0)))
        .collect();
    for c in 1..k {
        let chosen = match WeightedIndex::new(&nearest) {
            Ok(dist) => dist.sample(rng),
            // Every point already coincides with a centroid.
            Err(_) => rng.gen_range(0..n),
        };
        centroids.row_mut(c).assign(&points.row(chosen).mapv(f64::from));
        for (i, best) in nearest.iter_mut().enumerate() {
            let d2 = squared_distance(points.row(i), centroids.row(c));
            if d2 < *best {
                *best = d2;
            }
        }
    }
    centroids
}

fn lloyd(
    points: ArrayView2<'_, f32>,
    mut centroids: Array2<f64>,
    config: &KMeansConfig,
) -> KMeansResult {
    let (n, d) = points.dim();
    let k = centroids.nrows();
    let mut labels = vec![0usize; n];
    let mut iterations = 0;

    for _ in 0..config.max_iter {
        iterations += 1;
        assign(points, &centroids, &mut labels);

        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];
        for (i, &l) in labels.iter().enumerate() {
            counts[l] += 1;
            for (s, &x) in sums.row_mut(l).iter_mut().zip(points.row(i).iter()) {
                *s += f64::from(x);
            }
        }

        let mut shift = 0.0_f64;
        for c in 0..k {
            // An empty cluster keeps its previous centroid.
            if counts[c] == 0 {
                continue;
            }
            let inv = 1.0 / counts[c] as f64;
            let mut moved = 0.0;
            for (old, &s) in centroids.row_mut(c).iter_mut().zip(sums.row(c).iter()) {
                let new = s * inv;
                moved += (new - *old) * (new - *old);
                *old = new;
            }
            shift = shift.max(moved.sqrt());
        }
        if shift <= config.tol {
            break;
        }
    }

    let inertia = assign(points, &centroids, &mut labels);
    KMeansResult {
        labels,
        centroids: centroids.mapv(|v| v as f32),
        inertia,
        iterations,
    }
}

/// Assign each row to its nearest centroid (lowest index on ties); returns
/// the inertia.
fn assign(points: ArrayView2<'_, f32>, centroids: &Array2<f64>, labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (i, label) in labels.iter_mut().enumerate() {
        let mut best = f64::INFINITY;
        for (c, centroid) in centroids.rows().into_iter().enumerate() {
            let d2 = squared_distance(points.row(i), centroid);
            if d2 < best {
                best = d2;
                *label = c;
            }
        }
        inertia += best;
    }
    inertia
}

fn squared_distance(p: ArrayView1<'_, f32>, c: ArrayView1<'_, f64>) -> f64 {
    p.iter()
        .zip(c.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - y;
            d * d
        })
        .sum()
}

/// Inertia of an arbitrary labelling, for comparing runs.
pub fn inertia(
    points: ArrayView2<'_, f32>,
    centroids: ArrayView2<'_, f32>,
    labels: &[usize],
) -> f64 {
    labels
        .iter()
        .enumerate()
        .map(|(i, &l)| squared_euclidean(points.row(i), centroids.row(l)))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_blobs() -> Array2<f32> {
        array![
            [0.0, 0.0],
            [0.1, 0.1],
            [-0.1, 0.0],
            [5.0, 5.0],
            [5.1, 4.9],
            [4.9, 5.0],
            [-5.0, 5.0],
            [-5.1, 5.1],
            [-4.9, 4.9]
        ]
    }

    #[test]
    fn separates_three_blobs() {
        let cfg = KMeansConfig { n_clusters: 3, ..Default::default() };
        let res = kmeans(three_blobs().view(), &cfg).unwrap();
        for blob in res.labels.chunks(3) {
            assert!(blob.iter().all(|&l| l == blob[0]));
        }
        let mut firsts = vec![res.labels[0], res.labels[3], res.labels[6]];
        firsts.sort_unstable();
        firsts.dedup();
        assert_eq!(firsts.len(), 3);
        assert_eq!(res.cluster_sizes(), vec![3, 3, 3]);
        assert!(res.inertia < 0.2);
        let recomputed = inertia(three_blobs().view(), res.centroids.view(), &res.labels);
        approx::assert_relative_eq!(recomputed, res.inertia, max_relative = 1e-4);
    }

    #[test]
    fn same_seed_same_result() {
        let cfg = KMeansConfig { n_clusters: 2, n_init: 3, ..Default::default() };
        let a = kmeans(three_blobs().view(), &cfg).unwrap();
        let b = kmeans(three_blobs().view(), &cfg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identical_points_do_not_panic() {
        let p = Array2::<f32>::from_elem((5, 2), 1.0);
        let res = kmeans(p.view(), &KMeansConfig { n_clusters: 3, ..Default::default() }).unwrap();
        assert_eq!(res.inertia, 0.0);
        assert_eq!(res.labels, vec![0; 5]);
    }

    #[test]
    fn too_few_points() {
        let p = array![[0.0_f32], [1.0]];
        assert!(matches!(
            kmeans(p.view(), &KMeansConfig { n_clusters: 3, ..Default::default() }),
            Err(ClusterError::TooFewPoints { needed: 3, got: 2 })
        ));
    }
}
