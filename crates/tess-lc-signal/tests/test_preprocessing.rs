//! Integration tests for the preprocessing pipeline.
//!
//! Covers the property laws of the public API (normalization, truncation)
//! and a full gap-repair → normalize → split run on a synthetic sector.

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, Axis};
use proptest::prelude::*;
use tess_lc_signal::{
    interpolate_gaps, median, normalize, split_train_test, truncated_length, GapConfig,
    LightCurveBatch, SignalError,
};

// ---------------------------------------------------------------------------
// Property laws
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn prop_normalized_rows_have_zero_median(
        row in proptest::collection::vec(0.1f32..100.0, 1..64),
    ) {
        let flux = Array2::from_shape_vec((1, row.len()), row).unwrap();
        let out = normalize(flux.view()).unwrap();
        let values: Vec<f64> = out.row(0).iter().map(|&v| v as f64).collect();
        prop_assert!(median(&values).abs() < 1e-5);
    }

    #[test]
    fn prop_normalize_is_scale_invariant(
        row in proptest::collection::vec(0.1f32..100.0, 1..64),
        scale in 0.1f32..10.0,
    ) {
        let flux = Array2::from_shape_vec((1, row.len()), row).unwrap();
        let scaled = flux.mapv(|v| v * scale);
        let a = normalize(flux.view()).unwrap();
        let b = normalize(scaled.view()).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert!((x - y).abs() <= 1e-5 * (1.0 + x.abs()));
        }
    }

    #[test]
    fn prop_truncation_law(len in 1usize..5000, half_stages in 0usize..6) {
        let stages = 2 * half_stages;
        let block = 1usize << half_stages;
        let t = truncated_length(len, stages);
        prop_assert_eq!(t, (len / block) * block);
        prop_assert_eq!(t % block, 0);
        prop_assert!(t <= len && len - t < block);
    }

    #[test]
    fn prop_split_output_length_matches_truncation(len in 8usize..300, half_stages in 1usize..4) {
        let stages = 2 * half_stages;
        let time = Array1::from_iter((0..len).map(|i| i as f64));
        let flux = Array2::from_elem((4, len), 1.0_f32);
        let batch = LightCurveBatch::new(time, flux).unwrap();
        let split = split_train_test(&batch, stages, 0.5, None).unwrap();
        prop_assert_eq!(split.x_train.shape()[1], truncated_length(len, stages));
        prop_assert_eq!(split.time.len(), truncated_length(len, stages));
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn stratified_split_100_50() {
    let n = 150;
    let time = Array1::linspace(0.0, 27.0, 128);
    let flux = Array2::from_elem((n, 128), 1.0_f32);
    let batch = LightCurveBatch::new(time, flux).unwrap();
    let labels: Vec<usize> = (0..n).map(|i| if i < 100 { 0 } else { 1 }).collect();

    let split = split_train_test(&batch, 4, 0.9, Some(&labels)).unwrap();

    let train_counts = split.y_train.as_ref().unwrap().sum_axis(Axis(0));
    let test_counts = split.y_test.as_ref().unwrap().sum_axis(Axis(0));
    assert_eq!(train_counts.to_vec(), vec![90.0, 45.0]);
    assert_eq!(test_counts.to_vec(), vec![10.0, 5.0]);
    assert_eq!(split.x_train.shape(), &[135, 128, 1]);
    assert_eq!(split.x_test.shape(), &[15, 128, 1]);
    assert!(split.test_indices[..10].iter().all(|&i| i < 100));
    assert!(split.test_indices[10..].iter().all(|&i| i >= 100));
}

/// A two-minute-cadence sector with a dropout, a spike and an orbit gap
/// survives the full preprocessing chain with a shared time axis.
#[test]
fn full_pipeline_on_gappy_sector() {
    let cadence = 2.0 / (24.0 * 60.0);
    let n = 3000;
    let mut time: Vec<f64> = (0..n).map(|i| i as f64 * cadence).collect();
    // Downlink: the second half starts one day later.
    for t in time.iter_mut().skip(n / 2) {
        *t += 1.0;
    }
    let time = Array1::from(time);

    let mut flux = Array2::from_shape_fn((3, n), |(o, i)| {
        (100.0 * (o + 1) as f32) * (1.0 + 0.001 * (i as f32 * 0.01).sin())
    });
    flux[[0, 100]] = f32::NAN;
    flux[[0, 101]] = f32::NAN;
    flux[[2, 700]] = 1.0e5;
    for i in 1400..n / 2 {
        flux[[1, i]] = f32::NAN;
    }
    let batch = LightCurveBatch::new(time, flux).unwrap();

    let (repaired, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
    // Two dropped samples in object 0 plus the clipped spike in object 2.
    assert_eq!(report.clipped, 1);
    assert_eq!(report.linear_filled, 3);
    // 100 samples * 2 minutes is longer than the tolerance but shorter
    // than the orbit-gap maximum, so object 1 is spline-filled.
    assert_eq!(report.spline_filled, 100);
    assert!(report.dropped_indices.is_empty());
    assert_eq!(repaired.len(), n);
    assert!(repaired.flux().iter().all(|v| v.is_finite()));

    let normalized = repaired.with_flux(normalize(repaired.flux()).unwrap()).unwrap();
    for row in normalized.flux().rows() {
        assert_abs_diff_eq!(row[0], 0.0, epsilon = 2e-3);
    }

    let split = split_train_test(&normalized, 6, 0.67, None).unwrap();
    assert_eq!(split.x_train.shape(), &[2, 3000, 1]);
    assert_eq!(split.x_test.shape(), &[1, 3000, 1]);
}

#[test]
fn orbit_gap_columns_are_dropped_for_all_objects() {
    let time = Array1::from_iter((0..60).map(|i| i as f64 * 0.25));
    let mut flux = Array2::from_elem((2, 60), 5.0_f32);
    for i in 20..36 {
        flux[[0, i]] = f32::NAN;
    }
    let batch = LightCurveBatch::new(time, flux).unwrap();
    let (repaired, report) = interpolate_gaps(&batch, &GapConfig::default()).unwrap();
    assert_eq!(repaired.len(), 44);
    assert_eq!(report.dropped_indices.len(), 16);
    assert_eq!(repaired.time()[20], 36.0 * 0.25);
}

#[test]
fn zero_median_is_reported() {
    let flux = Array2::from_shape_vec((1, 3), vec![0.0_f32, 0.0, 1.0]).unwrap();
    assert!(matches!(normalize(flux.view()), Err(SignalError::ZeroMedian { object: 0 })));
}
