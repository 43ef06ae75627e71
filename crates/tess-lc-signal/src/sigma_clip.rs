//! Iterative median/MAD clipping.
//!
//! Uses the median and MAD (Median Absolute Deviation) instead of mean/std,
//! so a handful of flares or cosmic-ray hits cannot inflate the width
//! estimate and mask themselves. A sample is rejected when it lies more
//! than `threshold` raw MADs from the median; the MAD is not rescaled to a
//! Gaussian σ. Clipping repeats on the surviving samples until no new
//! point is rejected.

use serde::{Deserialize, Serialize};

/// Configuration for [`sigma_clip`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmaClipConfig {
    /// Rejection threshold in median absolute deviations.
    pub threshold: f64,
    /// Upper bound on clipping passes; `None` iterates to convergence.
    pub max_iters: Option<usize>,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            max_iters: None,
        }
    }
}

/// Sigma-clip a single series.
///
/// Returns a mask with `true` for every sample that was rejected. Samples
/// that are already non-finite are never reported as clipped; they are
/// simply ignored when estimating the centre and width.
pub fn sigma_clip(signal: &[f32], config: &SigmaClipConfig) -> Vec<bool> {
    let mut clipped = vec![false; signal.len()];
    let mut iter = 0usize;
    loop {
        if config.max_iters.map_or(false, |max| iter >= max) {
            break;
        }
        iter += 1;

        let survivors: Vec<f64> = signal
            .iter()
            .zip(&clipped)
            .filter(|(v, c)| v.is_finite() && !**c)
            .map(|(&v, _)| v as f64)
            .collect();
        if survivors.len() < 3 {
            break;
        }
        let med = median(&survivors);
        let mad = median_absolute_deviation(&survivors, med);
        if mad <= 1e-15 {
            // Constant series: nothing can be an outlier relative to it.
            break;
        }

        let limit = config.threshold * mad;
        let mut changed = false;
        for (i, &v) in signal.iter().enumerate() {
            if clipped[i] || !v.is_finite() {
                continue;
            }
            if (v as f64 - med).abs() > limit {
                clipped[i] = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    clipped
}

/// Compute median of a slice (sorts a copy). Returns NaN for an empty slice.
pub fn median(data: &[f64]) -> f64 {
    if data.is_empty() {
        return f64::NAN;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Compute MAD (Median Absolute Deviation) given precomputed median.
fn median_absolute_deviation(data: &[f64], med: f64) -> f64 {
    let deviations: Vec<f64> = data.iter().map(|x| (x - med).abs()).collect();
    median(&deviations)
}
