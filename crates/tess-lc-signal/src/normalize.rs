//! Per-object flux scaling.
//!
//! All three functions operate row-wise on a `[objects, time]` matrix and
//! never mix information between objects.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::debug;

use crate::sigma_clip::median;
use crate::{Result, SignalError};

/// Divide every row by its own median and subtract one.
///
/// The result has per-row median 0 and is invariant to positive rescaling
/// of the input row.
///
/// # Errors
///
/// [`SignalError::ZeroMedian`] when a row's median is exactly zero and
/// [`SignalError::NonFinite`] when a row's median is NaN (a NaN sample in
/// the row). Run [`crate::interpolate_gaps`] first on gappy data.
pub fn normalize(flux: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    let mut out = flux.to_owned();
    for (object, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        if let Some(index) = row.iter().position(|v| !v.is_finite()) {
            return Err(SignalError::NonFinite { object, index });
        }
        let values: Vec<f64> = row.iter().map(|&v| v as f64).collect();
        let med = median(&values);
        if med == 0.0 {
            return Err(SignalError::ZeroMedian { object });
        }
        row.mapv_inplace(|v| (v as f64 / med - 1.0) as f32);
    }
    debug!(objects = out.nrows(), "normalized flux by per-object median");
    Ok(out)
}

/// Rescale every row to zero mean and unit variance.
///
/// Uses the population standard deviation (`ddof = 0`) along the time axis.
///
/// # Errors
///
/// [`SignalError::ZeroVariance`] when a row is constant.
pub fn standardize(x: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
    let mut out = x.to_owned();
    for (object, mut row) in out.axis_iter_mut(Axis(0)).enumerate() {
        let n = row.len() as f64;
        let mean = row.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = row.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if !(std > 0.0) {
            return Err(SignalError::ZeroVariance { object });
        }
        row.mapv_inplace(|v| ((v as f64 - mean) / std) as f32);
    }
    Ok(out)
}

/// Root-mean-square of every row: `sqrt(mean(x^2))`.
pub fn rms(x: ArrayView2<'_, f32>) -> Array1<f32> {
    x.map_axis(Axis(1), |row| {
        let n = row.len().max(1) as f64;
        (row.iter().map(|&v| (v as f64).powi(2)).sum::<f64>() / n).sqrt() as f32
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn normalize_centres_on_median() {
        let flux = array![[2.0_f32, 4.0, 6.0], [10.0, 10.0, 20.0]];
        let out = normalize(flux.view()).unwrap();
        assert_abs_diff_eq!(out[[0, 1]], 0.0, epsilon = 1e-7);
        assert_abs_diff_eq!(out[[0, 0]], -0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(out[[1, 2]], 1.0, epsilon = 1e-7);
    }

    #[test]
    fn normalize_rejects_zero_median() {
        let flux = array![[1.0_f32, 1.0, 1.0], [0.0, 0.0, 5.0]];
        assert!(matches!(normalize(flux.view()), Err(SignalError::ZeroMedian { object: 1 })));
    }

    #[test]
    fn normalize_rejects_nan() {
        let flux = array![[1.0_f32, f32::NAN, 1.0]];
        assert!(matches!(
            normalize(flux.view()),
            Err(SignalError::NonFinite { object: 0, index: 1 })
        ));
    }

    #[test]
    fn standardize_gives_unit_variance() {
        let x = array![[1.0_f32, 2.0, 3.0, 4.0]];
        let out = standardize(x.view()).unwrap();
        let mean: f32 = out.row(0).sum() / 4.0;
        let var: f32 = out.row(0).iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn standardize_rejects_constant_row() {
        let x = array![[1.0_f32, 2.0], [3.0, 3.0]];
        assert!(matches!(standardize(x.view()), Err(SignalError::ZeroVariance { object: 1 })));
    }

    #[test]
    fn rms_of_constant_row_is_its_magnitude() {
        let x = array![[-2.0_f32, -2.0, -2.0], [3.0, 4.0, 0.0]];
        let r = rms(x.view());
        assert_abs_diff_eq!(r[0], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r[1], (25.0_f32 / 3.0).sqrt(), epsilon = 1e-6);
    }
}
