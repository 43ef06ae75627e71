//! Truncation and train/test partitioning.
//!
//! The encoder halves the time axis once per stage, so the series must be a
//! multiple of `2^(num_conv_layers / 2)` long before it reaches the model.
//! [`split_train_test`] truncates to that length and then splits the objects
//! either by a plain ratio (first `floor(n * ratio)` objects train) or
//! stratified per class.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Array3, Axis};
use tracing::debug;

use crate::batch::LightCurveBatch;
use crate::{Result, SignalError};

/// Guards `floor(n * ratio)` against `0.9 * 10 = 8.999...`.
const RATIO_EPS: f64 = 1e-9;

/// Output of [`split_train_test`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    /// Training tensor, `[objects, time, 1]`.
    pub x_train: Array3<f32>,
    /// Test tensor, `[objects, time, 1]`. May hold zero objects.
    pub x_test: Array3<f32>,
    /// One-hot training labels, `[objects, classes]` (supervised only).
    pub y_train: Option<Array2<f32>>,
    /// One-hot test labels, `[objects, classes]` (supervised only).
    pub y_test: Option<Array2<f32>>,
    /// Row of the input batch behind each training object.
    pub train_indices: Vec<usize>,
    /// Row of the input batch behind each test object.
    pub test_indices: Vec<usize>,
    /// Distinct class labels in ascending order; column `j` of the one-hot
    /// matrices stands for `classes[j]`.
    pub classes: Vec<usize>,
    /// The truncated time axis.
    pub time: Array1<f64>,
}

impl TrainTestSplit {
    /// Length of the truncated time axis.
    pub fn series_len(&self) -> usize {
        self.time.len()
    }
}

/// `floor(len / 2^(S/2)) * 2^(S/2)`.
///
/// ```rust
/// use tess_lc_signal::truncated_length;
/// assert_eq!(truncated_length(100, 4), 100);
/// assert_eq!(truncated_length(103, 4), 100);
/// assert_eq!(truncated_length(103, 6), 96);
/// ```
pub fn truncated_length(len: usize, num_conv_layers: usize) -> usize {
    let block = block_size(num_conv_layers);
    (len / block) * block
}

fn block_size(num_conv_layers: usize) -> usize {
    1usize << (num_conv_layers / 2)
}

/// Truncate the time axis and partition the objects of `batch`.
///
/// With `labels == None` the first `floor(n * ratio)` objects form the
/// training set. With labels, every class is split separately in its
/// input order and the per-class pieces are concatenated in ascending
/// class order.
///
/// # Errors
///
/// - [`SignalError::InvalidRatio`] unless `0 < ratio < 1`.
/// - [`SignalError::InvalidParameter`] for an odd `num_conv_layers`.
/// - [`SignalError::TooShort`] when the series is shorter than one block.
/// - [`SignalError::LabelCountMismatch`] when labels and objects disagree.
/// - [`SignalError::EmptyPartition`] when no object lands in training.
pub fn split_train_test(
    batch: &LightCurveBatch,
    num_conv_layers: usize,
    ratio: f64,
    labels: Option<&[usize]>,
) -> Result<TrainTestSplit> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(SignalError::InvalidRatio { ratio });
    }
    if num_conv_layers % 2 != 0 {
        return Err(SignalError::invalid(
            "num_conv_layers",
            format!("must be even, got {num_conv_layers}"),
        ));
    }
    let block = block_size(num_conv_layers);
    let new_len = truncated_length(batch.len(), num_conv_layers);
    if new_len == 0 {
        return Err(SignalError::TooShort { length: batch.len(), block });
    }
    let batch = batch.truncate(new_len)?;
    let n = batch.num_objects();

    let (train_indices, test_indices, classes, onehot) = match labels {
        None => {
            let split = take_count(n, ratio);
            ((0..split).collect(), (split..n).collect(), Vec::new(), None)
        }
        Some(labels) => {
            if labels.len() != n {
                return Err(SignalError::LabelCountMismatch { labels: labels.len(), objects: n });
            }
            let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (row, &label) in labels.iter().enumerate() {
                by_class.entry(label).or_default().push(row);
            }
            let classes: Vec<usize> = by_class.keys().copied().collect();
            let mut train = Vec::new();
            let mut test = Vec::new();
            for rows in by_class.values() {
                let k = take_count(rows.len(), ratio);
                train.extend_from_slice(&rows[..k]);
                test.extend_from_slice(&rows[k..]);
            }
            (train, test, classes, Some(labels))
        }
    };

    if train_indices.is_empty() {
        return Err(SignalError::EmptyPartition { partition: "train" });
    }

    let (y_train, y_test) = match onehot {
        Some(labels) => (
            Some(one_hot(&train_indices, labels, &classes)),
            Some(one_hot(&test_indices, labels, &classes)),
        ),
        None => (None, None),
    };

    debug!(
        length = new_len,
        train = train_indices.len(),
        test = test_indices.len(),
        classes = classes.len(),
        "split light curves"
    );

    let flux = batch.flux();
    Ok(TrainTestSplit {
        x_train: to_tensor(flux.select(Axis(0), &train_indices)),
        x_test: to_tensor(flux.select(Axis(0), &test_indices)),
        y_train,
        y_test,
        train_indices,
        test_indices,
        classes,
        time: batch.time().to_owned(),
    })
}

fn take_count(n: usize, ratio: f64) -> usize {
    ((n as f64 * ratio + RATIO_EPS).floor() as usize).min(n)
}

fn one_hot(rows: &[usize], labels: &[usize], classes: &[usize]) -> Array2<f32> {
    let mut out = Array2::zeros((rows.len(), classes.len()));
    for (i, &row) in rows.iter().enumerate() {
        if let Ok(col) = classes.binary_search(&labels[row]) {
            out[[i, col]] = 1.0;
        }
    }
    out
}

fn to_tensor(flux: Array2<f32>) -> Array3<f32> {
    flux.insert_axis(Axis(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn batch(objects: usize, len: usize) -> LightCurveBatch {
        let time = Array1::from_iter((0..len).map(|i| i as f64));
        let flux = Array2::from_shape_fn((objects, len), |(o, t)| (o * 1000 + t) as f32);
        LightCurveBatch::new(time, flux).unwrap()
    }

    #[test]
    fn unsupervised_split_takes_leading_objects() {
        let s = split_train_test(&batch(10, 37), 4, 0.9, None).unwrap();
        assert_eq!(s.x_train.shape(), &[9, 36, 1]);
        assert_eq!(s.x_test.shape(), &[1, 36, 1]);
        assert_eq!(s.test_indices, vec![9]);
        assert_eq!(s.x_test[[0, 5, 0]], 9005.0);
        assert!(s.y_train.is_none() && s.y_test.is_none());
        assert_eq!(s.series_len(), 36);
    }

    #[test]
    fn stratified_split_preserves_class_proportions() {
        let labels: Vec<usize> = (0..150).map(|i| usize::from(i >= 100)).collect();
        let s = split_train_test(&batch(150, 16), 2, 0.9, Some(&labels)).unwrap();
        let y_train = s.y_train.unwrap();
        let y_test = s.y_test.unwrap();
        assert_eq!(y_train.sum_axis(Axis(0)).to_vec(), vec![90.0, 45.0]);
        assert_eq!(y_test.sum_axis(Axis(0)).to_vec(), vec![10.0, 5.0]);
        assert_eq!(s.x_train.shape()[0], 135);
        assert_eq!(s.x_test.shape()[0], 15);
        assert_eq!(s.classes, vec![0, 1]);
    }

    #[test]
    fn labels_map_to_ascending_columns() {
        let labels = [7, 3, 7, 3];
        let s = split_train_test(&batch(4, 8), 2, 0.5, Some(&labels)).unwrap();
        assert_eq!(s.classes, vec![3, 7]);
        // Class 3 first (row 1), then class 7 (row 0).
        assert_eq!(s.train_indices, vec![1, 0]);
        let y = s.y_train.unwrap();
        assert_eq!(y.row(0).to_vec(), vec![1.0, 0.0]);
        assert_eq!(y.row(1).to_vec(), vec![0.0, 1.0]);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        for ratio in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                split_train_test(&batch(4, 8), 2, ratio, None),
                Err(SignalError::InvalidRatio { .. })
            ));
        }
    }

    #[test]
    fn rejects_series_shorter_than_block() {
        assert!(matches!(
            split_train_test(&batch(4, 3), 4, 0.5, None),
            Err(SignalError::TooShort { length: 3, block: 4 })
        ));
    }

    #[test]
    fn rejects_odd_stage_count() {
        assert!(split_train_test(&batch(4, 8), 3, 0.5, None).is_err());
    }

    #[test]
    fn rejects_label_mismatch() {
        assert!(matches!(
            split_train_test(&batch(4, 8), 2, 0.5, Some(&[0, 1])),
            Err(SignalError::LabelCountMismatch { labels: 2, objects: 4 })
        ));
    }

    #[test]
    fn tiny_ratio_leaves_train_empty() {
        assert!(matches!(
            split_train_test(&batch(3, 8), 2, 0.1, None),
            Err(SignalError::EmptyPartition { partition: "train" })
        ));
    }
}
