//! Shared-time-axis container for a batch of light curves.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::{Result, SignalError};

/// A batch of light curves sampled on one common time axis.
///
/// Invariants, checked on construction:
///
/// - the batch holds at least one object and one time sample;
/// - `flux.ncols() == time.len()`;
/// - `time` is strictly increasing;
/// - `ids.len() == flux.nrows()`.
///
/// Flux values may be NaN (missing samples); [`crate::interpolate_gaps`]
/// removes them.
#[derive(Debug, Clone, PartialEq)]
pub struct LightCurveBatch {
    time: Array1<f64>,
    flux: Array2<f32>,
    ids: Vec<u64>,
}

impl LightCurveBatch {
    /// Build a batch with sequential object ids `0..n`.
    ///
    /// # Errors
    ///
    /// [`SignalError::EmptyBatch`], [`SignalError::ShapeMismatch`] or
    /// [`SignalError::NonMonotonicTime`] when an invariant is violated.
    pub fn new(time: Array1<f64>, flux: Array2<f32>) -> Result<Self> {
        let ids = (0..flux.nrows() as u64).collect();
        Self::with_ids(time, flux, ids)
    }

    /// Build a batch carrying explicit object identifiers (e.g. TIC ids).
    pub fn with_ids(time: Array1<f64>, flux: Array2<f32>, ids: Vec<u64>) -> Result<Self> {
        if flux.nrows() == 0 || time.is_empty() {
            return Err(SignalError::EmptyBatch);
        }
        if flux.ncols() != time.len() {
            return Err(SignalError::shape_mismatch(
                vec![flux.nrows(), time.len()],
                flux.shape().to_vec(),
            ));
        }
        if ids.len() != flux.nrows() {
            return Err(SignalError::shape_mismatch(vec![flux.nrows()], vec![ids.len()]));
        }
        if let Some(index) = first_non_increasing(time.view()) {
            return Err(SignalError::NonMonotonicTime { index });
        }
        Ok(LightCurveBatch { time, flux, ids })
    }

    /// Replace the flux matrix, keeping time axis and ids.
    pub fn with_flux(&self, flux: Array2<f32>) -> Result<Self> {
        Self::with_ids(self.time.clone(), flux, self.ids.clone())
    }

    /// Shared time axis.
    pub fn time(&self) -> ArrayView1<'_, f64> {
        self.time.view()
    }

    /// Flux matrix, one row per object.
    pub fn flux(&self) -> ArrayView2<'_, f32> {
        self.flux.view()
    }

    /// Object identifiers, one per row.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Number of objects.
    pub fn num_objects(&self) -> usize {
        self.flux.nrows()
    }

    /// Number of time samples.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always `false`: an empty batch cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Keep only the first `len` time samples of every object.
    pub fn truncate(&self, len: usize) -> Result<Self> {
        let len = len.min(self.len());
        if len == 0 {
            return Err(SignalError::EmptyBatch);
        }
        Ok(LightCurveBatch {
            time: self.time.slice(s![..len]).to_owned(),
            flux: self.flux.slice(s![.., ..len]).to_owned(),
            ids: self.ids.clone(),
        })
    }

    /// Keep only the time indices whose `keep` flag is set.
    pub fn retain_columns(&self, keep: &[bool]) -> Result<Self> {
        if keep.len() != self.len() {
            return Err(SignalError::shape_mismatch(vec![self.len()], vec![keep.len()]));
        }
        let cols: Vec<usize> = (0..keep.len()).filter(|&j| keep[j]).collect();
        if cols.is_empty() {
            return Err(SignalError::AllSamplesDropped);
        }
        Ok(LightCurveBatch {
            time: self.time.select(Axis(0), &cols),
            flux: self.flux.select(Axis(1), &cols),
            ids: self.ids.clone(),
        })
    }

    /// Take the objects at `rows`, in the given order.
    pub fn select_objects(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.num_objects()) {
            return Err(SignalError::invalid(
                "rows",
                format!("row {bad} out of bounds for {} objects", self.num_objects()),
            ));
        }
        Self::with_ids(
            self.time.clone(),
            self.flux.select(Axis(0), rows),
            rows.iter().map(|&r| self.ids[r]).collect(),
        )
    }

    /// Median spacing between consecutive timestamps.
    ///
    /// Returns `None` for a single-sample batch.
    pub fn cadence(&self) -> Option<f64> {
        if self.len() < 2 {
            return None;
        }
        let mut diffs: Vec<f64> = self.time.windows(2).into_iter().map(|w| w[1] - w[0]).collect();
        diffs.sort_by(|a, b| a.total_cmp(b));
        Some(diffs[diffs.len() / 2])
    }

    /// Decompose into `(time, flux, ids)`.
    pub fn into_parts(self) -> (Array1<f64>, Array2<f32>, Vec<u64>) {
        (self.time, self.flux, self.ids)
    }
}

fn first_non_increasing(time: ArrayView1<'_, f64>) -> Option<usize> {
    (1..time.len()).find(|&i| !(time[i] > time[i - 1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> LightCurveBatch {
        LightCurveBatch::new(
            array![0.0, 0.1, 0.2, 0.3],
            array![[1.0_f32, 2.0, 3.0, 4.0], [5.0, 6.0, 7.0, 8.0]],
        )
        .unwrap()
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = LightCurveBatch::new(array![0.0, 1.0], array![[1.0_f32, 2.0, 3.0]]);
        assert!(matches!(err, Err(SignalError::ShapeMismatch { .. })));
    }

    #[test]
    fn rejects_repeated_timestamp() {
        let err = LightCurveBatch::new(array![0.0, 1.0, 1.0], array![[1.0_f32, 2.0, 3.0]]);
        assert!(matches!(err, Err(SignalError::NonMonotonicTime { index: 2 })));
    }

    #[test]
    fn truncate_keeps_prefix() {
        let b = sample().truncate(2).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.flux(), array![[1.0_f32, 2.0], [5.0, 6.0]]);
    }

    #[test]
    fn retain_columns_drops_time_and_flux_together() {
        let b = sample().retain_columns(&[true, false, true, false]).unwrap();
        assert_eq!(b.time(), array![0.0, 0.2]);
        assert_eq!(b.flux(), array![[1.0_f32, 3.0], [5.0, 7.0]]);
    }

    #[test]
    fn select_objects_carries_ids() {
        let b = LightCurveBatch::with_ids(
            array![0.0, 1.0],
            array![[1.0_f32, 1.0], [2.0, 2.0], [3.0, 3.0]],
            vec![100, 200, 300],
        )
        .unwrap();
        let picked = b.select_objects(&[2, 0]).unwrap();
        assert_eq!(picked.ids(), &[300, 100]);
        assert_eq!(picked.flux()[[0, 0]], 3.0);
    }

    #[test]
    fn cadence_is_median_spacing() {
        let b = LightCurveBatch::new(array![0.0, 1.0, 2.0, 10.0], array![[0.0_f32, 0.0, 0.0, 0.0]])
            .unwrap();
        assert_eq!(b.cadence(), Some(1.0));
    }
}
