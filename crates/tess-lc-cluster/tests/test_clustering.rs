//! Contract tests for the latent-space analysis functions.

use ndarray::Array2;
use proptest::prelude::*;
use tess_lc_cluster::{
    confusion_matrix, dbscan, kmeans, local_outlier_factor, ClusterError, ClusterSummary,
    DbscanConfig, KMeansConfig,
};

fn latent(rows: Vec<(f32, f32)>) -> Array2<f32> {
    let n = rows.len();
    Array2::from_shape_vec((n, 2), rows.into_iter().flat_map(|(a, b)| [a, b]).collect()).unwrap()
}

proptest! {
    /// Identical inputs and parameters reproduce identical labels.
    #[test]
    fn dbscan_is_deterministic(
        rows in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 1..60),
        eps in 0.1f32..5.0,
        min_samples in 1usize..6,
    ) {
        let x = latent(rows);
        let cfg = DbscanConfig { eps, min_samples };
        let a = dbscan(x.view(), &cfg).unwrap();
        let b = dbscan(x.view(), &cfg).unwrap();
        prop_assert_eq!(&a, &b);

        // Cluster ids are dense: every id below the maximum is used.
        let summary = ClusterSummary::from_labels(&a);
        prop_assert!(summary.sizes.iter().all(|&s| s > 0));
        prop_assert_eq!(summary.sizes.iter().sum::<usize>() + summary.noise, a.len());
    }

    /// LOF scores exist exactly when there are more than `k` points.
    #[test]
    fn lof_boundary(n in 1usize..12, k in 1usize..12) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 7 + j * 3) as f32 * 0.37);
        match local_outlier_factor(x.view(), k) {
            Ok(scores) => {
                prop_assert!(n > k);
                prop_assert_eq!(scores.len(), n);
                prop_assert!(scores.iter().all(|s| s.is_finite()));
            }
            Err(ClusterError::InsufficientNeighbors { k: kk, n: nn }) => {
                prop_assert!(n <= k);
                prop_assert_eq!((kk, nn), (k, n));
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    /// Every k-means label is in `0..k`.
    #[test]
    fn kmeans_labels_in_range(
        rows in proptest::collection::vec((-10.0f32..10.0, -10.0f32..10.0), 4..40),
        k in 1usize..4,
    ) {
        let x = latent(rows);
        let cfg = KMeansConfig { n_clusters: k, n_init: 2, max_iter: 50, ..Default::default() };
        let res = kmeans(x.view(), &cfg).unwrap();
        prop_assert!(res.labels.iter().all(|&l| l < k));
        prop_assert!(res.inertia >= 0.0);
    }
}

#[test]
fn dbscan_and_kmeans_agree_on_separated_blobs() {
    let mut rows = Vec::new();
    for i in 0..20 {
        let d = (i % 5) as f32 * 0.05;
        rows.push((d, (i / 5) as f32 * 0.05));
    }
    for i in 0..20 {
        let d = (i % 5) as f32 * 0.05;
        rows.push((8.0 + d, 8.0 + (i / 5) as f32 * 0.05));
    }
    let x = latent(rows);

    let density = dbscan(x.view(), &DbscanConfig { eps: 0.2, min_samples: 4 }).unwrap();
    assert!(density.iter().all(Option::is_some));
    let centroid = kmeans(x.view(), &KMeansConfig { n_clusters: 2, ..Default::default() }).unwrap();

    let density: Vec<usize> = density.into_iter().flatten().collect();
    let cm = confusion_matrix(&density, &centroid.labels).unwrap();
    // One-to-one correspondence: each row has exactly one non-zero cell.
    for row in cm.counts.rows() {
        assert_eq!(row.iter().filter(|&&c| c > 0).count(), 1);
        assert_eq!(row.sum(), 20);
    }
}
