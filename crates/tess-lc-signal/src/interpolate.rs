//! Gap repair for light curves with missing samples.
//!
//! TESS light curves arrive with NaN runs (momentum dumps, scattered light)
//! and a long mid-sector downlink gap. [`interpolate_gaps`] repairs what is
//! short enough to repair and removes what is not:
//!
//! ```text
//!   raw flux ──► sigma clip (clipped → missing)
//!            ──► runs of missing samples
//!                 ├─ duration ≤ tolerance               → linear fill
//!                 ├─ tolerance < duration < orbit max   → cubic spline fill
//!                 └─ longer                             → left missing
//!            ──► drop every time index still missing in ANY object
//! ```
//!
//! The last step is done at the time-index level across the whole batch, so
//! all objects keep sharing one time axis.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::LightCurveBatch;
use crate::sigma_clip::{sigma_clip, SigmaClipConfig};
use crate::spline::CubicSpline;
use crate::{Result, SignalError};

/// Parameters for [`interpolate_gaps`].
///
/// Durations are in the units of the batch time axis (days for TESS BJD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapConfig {
    /// Gaps no longer than this are filled by linear interpolation.
    /// Default: **20 minutes**.
    pub tolerance: f64,
    /// Clipping threshold in median absolute deviations. Default: **5**.
    pub sigma_threshold: f64,
    /// Gaps shorter than this (and longer than `tolerance`) are filled by a
    /// cubic spline; anything longer is treated as an orbit gap and dropped.
    /// Default: **3 days**.
    pub orbit_gap_max: f64,
}

impl Default for GapConfig {
    fn default() -> Self {
        GapConfig {
            tolerance: 20.0 / (24.0 * 60.0),
            sigma_threshold: 5.0,
            orbit_gap_max: 3.0,
        }
    }
}

impl GapConfig {
    /// Check that the thresholds are positive and ordered.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(SignalError::invalid("tolerance", "must be > 0"));
        }
        if !(self.sigma_threshold > 0.0) {
            return Err(SignalError::invalid("sigma_threshold", "must be > 0"));
        }
        if !(self.orbit_gap_max > self.tolerance) {
            return Err(SignalError::invalid("orbit_gap_max", "must be > tolerance"));
        }
        Ok(())
    }
}

/// Bookkeeping returned by [`interpolate_gaps`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GapReport {
    /// Samples rejected by sigma clipping, summed over objects.
    pub clipped: usize,
    /// Samples filled by linear interpolation, summed over objects.
    pub linear_filled: usize,
    /// Samples filled by the cubic spline, summed over objects.
    pub spline_filled: usize,
    /// Time indices (in the input axis) removed from every object.
    pub dropped_indices: Vec<usize>,
}

/// A maximal run of consecutive missing samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    len: usize,
}

impl Run {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Sigma-clip, fill and align every light curve of `batch`.
///
/// # Errors
///
/// - [`SignalError::InvalidParameter`] for an inconsistent `config`.
/// - [`SignalError::AllSamplesDropped`] when no time index survives in all
///   objects.
pub fn interpolate_gaps(
    batch: &LightCurveBatch,
    config: &GapConfig,
) -> Result<(LightCurveBatch, GapReport)> {
    config.validate()?;
    let time: Vec<f64> = batch.time().to_vec();
    let cadence = batch.cadence().unwrap_or(f64::INFINITY);
    let clip_cfg = SigmaClipConfig {
        threshold: config.sigma_threshold,
        max_iters: None,
    };

    let mut report = GapReport::default();
    let mut flux = batch.flux().to_owned();

    for mut row in flux.rows_mut() {
        let mut values: Vec<f64> = row.iter().map(|&v| v as f64).collect();

        let raw: Vec<f32> = row.to_vec();
        for (i, clipped) in sigma_clip(&raw, &clip_cfg).into_iter().enumerate() {
            if clipped {
                values[i] = f64::NAN;
                report.clipped += 1;
            }
        }

        let runs = missing_runs(&values);
        let short: Vec<Run> = runs
            .iter()
            .copied()
            .filter(|r| r.len as f64 * cadence <= config.tolerance)
            .collect();
        let medium: Vec<Run> = runs
            .iter()
            .copied()
            .filter(|r| {
                let d = r.len as f64 * cadence;
                d > config.tolerance && d < config.orbit_gap_max
            })
            .collect();

        report.linear_filled += fill_linear(&mut values, &time, &short);
        report.spline_filled += fill_spline(&mut values, &time, &medium)?;

        for (dst, &v) in row.iter_mut().zip(&values) {
            *dst = v as f32;
        }
    }

    let keep: Vec<bool> = flux
        .columns()
        .into_iter()
        .map(|col| col.iter().all(|v| v.is_finite()))
        .collect();
    report.dropped_indices = keep
        .iter()
        .enumerate()
        .filter(|(_, &k)| !k)
        .map(|(i, _)| i)
        .collect();

    let repaired = batch.with_flux(flux)?.retain_columns(&keep)?;
    info!(
        objects = repaired.num_objects(),
        clipped = report.clipped,
        linear = report.linear_filled,
        spline = report.spline_filled,
        dropped = report.dropped_indices.len(),
        "interpolated light-curve gaps"
    );
    Ok((repaired, report))
}

fn missing_runs(values: &[f64]) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < values.len() {
        if values[i].is_nan() {
            let start = i;
            while i < values.len() && values[i].is_nan() {
                i += 1;
            }
            runs.push(Run { start, len: i - start });
        } else {
            i += 1;
        }
    }
    runs
}

/// Fill each run from its nearest valid neighbours; an edge run takes the
/// value of its single neighbour. Returns the number of filled samples.
fn fill_linear(values: &mut [f64], time: &[f64], runs: &[Run]) -> usize {
    let mut filled = 0;
    for run in runs {
        let left = run.start.checked_sub(1);
        let right = (run.end() < values.len()).then_some(run.end());
        for j in run.start..run.end() {
            values[j] = match (left, right) {
                (Some(l), Some(r)) => {
                    let w = (time[j] - time[l]) / (time[r] - time[l]);
                    values[l] + w * (values[r] - values[l])
                }
                (Some(l), None) => values[l],
                (None, Some(r)) => values[r],
                (None, None) => continue,
            };
            filled += 1;
        }
    }
    filled
}

/// Fill runs from a natural cubic spline through every currently valid
/// sample. Returns the number of filled samples.
fn fill_spline(values: &mut [f64], time: &[f64], runs: &[Run]) -> Result<usize> {
    if runs.is_empty() {
        return Ok(0);
    }
    let (knots_x, knots_y): (Vec<f64>, Vec<f64>) = time
        .iter()
        .zip(values.iter())
        .filter(|(_, v)| v.is_finite())
        .map(|(&t, &v)| (t, v))
        .unzip();
    if knots_x.len() < 2 {
        debug!("not enough valid samples for a spline; leaving gaps open");
        return Ok(0);
    }
    let spline = CubicSpline::natural(&knots_x, &knots_y)?;
    let mut filled = 0;
    for run in runs {
        for j in run.start..run.end() {
            values[j] = spline.eval(time[j]);
            filled += 1;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    const MINUTE: f64 = 1.0 / (24.0 * 60.0);

    /// Two-minute cadence, like TESS short-cadence targets.
    fn axis(n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| i as f64 * 2.0 * MINUTE))
    }

    fn ramp(n: usize) -> Vec<f32> {
        (0..n).map(|i| 1.0 + 0.001 * i as f32).collect()
    }

    #[test]
    fn short_gap_is_filled_linearly() {
        let mut row = ramp(50);
        row[10] = f32::NAN;
        row[11] = f32::NAN;
        let batch = LightCurveBatch::new(axis(50), Array2::from_shape_vec((1, 50), row).unwrap())
            .unwrap();
        let (out, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
        assert_eq!(out.len(), 50);
        assert_eq!(report.linear_filled, 2);
        assert_abs_diff_eq!(out.flux()[[0, 10]], 1.010, epsilon = 1e-5);
        assert_abs_diff_eq!(out.flux()[[0, 11]], 1.011, epsilon = 1e-5);
    }

    #[test]
    fn medium_gap_is_filled_by_spline() {
        // 30 missing samples at 2-minute cadence = 1 hour > 20-minute tolerance.
        let n = 200;
        let mut row: Vec<f32> =
            (0..n).map(|i| 1.0 + 0.01 * (i as f32 * 0.02).sin()).collect();
        for v in &mut row[80..110] {
            *v = f32::NAN;
        }
        let batch = LightCurveBatch::new(axis(n), Array2::from_shape_vec((1, n), row).unwrap())
            .unwrap();
        let (out, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
        assert_eq!(report.spline_filled, 30);
        assert!(report.dropped_indices.is_empty());
        let expected = 1.0 + 0.01 * (95.0_f32 * 0.02).sin();
        assert_abs_diff_eq!(out.flux()[[0, 95]], expected, epsilon = 1e-3);
    }

    #[test]
    fn orbit_gap_is_dropped_from_every_object() {
        let n = 40;
        let time = Array1::from_iter((0..n).map(|i| i as f64 * 0.25));
        let mut a: Vec<f32> = vec![1.0; n];
        let b: Vec<f32> = vec![2.0; n];
        // 16 samples * 0.25 d = 4 d, longer than the 3 d orbit-gap maximum.
        for v in &mut a[10..26] {
            *v = f32::NAN;
        }
        let flux = Array2::from_shape_vec((2, n), a.into_iter().chain(b).collect()).unwrap();
        let batch = LightCurveBatch::new(time, flux).unwrap();
        let (out, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
        assert_eq!(out.len(), n - 16);
        assert_eq!(report.dropped_indices, (10..26).collect::<Vec<_>>());
        assert!(out.flux().iter().all(|v| v.is_finite()));
        assert_eq!(out.flux()[[1, 12]], 2.0);
    }

    #[test]
    fn clipped_spike_is_replaced() {
        let mut row = ramp(60);
        row[30] = 100.0;
        let batch = LightCurveBatch::new(axis(60), Array2::from_shape_vec((1, 60), row).unwrap())
            .unwrap();
        let (out, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
        assert_eq!(report.clipped, 1);
        assert_abs_diff_eq!(out.flux()[[0, 30]], 1.030, epsilon = 1e-5);
    }

    #[test]
    fn fully_missing_batch_fails() {
        let batch = LightCurveBatch::new(axis(4), Array2::from_elem((1, 4), f32::NAN)).unwrap();
        assert!(matches!(
            interpolate_gaps(&batch, &GapConfig::default()),
            Err(SignalError::AllSamplesDropped)
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = GapConfig { tolerance: 5.0, orbit_gap_max: 1.0, ..GapConfig::default() };
        let batch = LightCurveBatch::new(axis(4), Array2::ones((1, 4))).unwrap();
        assert!(interpolate_gaps(&batch, &cfg).is_err());
    }

    #[test]
    fn runs_are_maximal() {
        let v = [1.0, f64::NAN, f64::NAN, 2.0, f64::NAN];
        assert_eq!(
            missing_runs(&v),
            vec![Run { start: 1, len: 2 }, Run { start: 4, len: 1 }]
        );
    }
}
