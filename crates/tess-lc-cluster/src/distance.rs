//! Shared distance helpers.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::{ClusterError, Result};

/// Reject empty matrices and non-finite entries.
pub(crate) fn check_points(points: ArrayView2<'_, f32>) -> Result<()> {
    if points.nrows() == 0 || points.ncols() == 0 {
        return Err(ClusterError::EmptyInput);
    }
    for (row, v) in points.rows().into_iter().enumerate() {
        if v.iter().any(|x| !x.is_finite()) {
            return Err(ClusterError::NonFinite { row });
        }
    }
    Ok(())
}

pub(crate) fn squared_euclidean(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum()
}

/// Symmetric `[n, n]` Euclidean distance matrix.
pub(crate) fn pairwise(points: ArrayView2<'_, f32>) -> Array2<f64> {
    let n = points.nrows();
    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        for j in i + 1..n {
            let v = squared_euclidean(points.row(i), points.row(j)).sqrt();
            d[[i, j]] = v;
            d[[j, i]] = v;
        }
    }
    d
}
