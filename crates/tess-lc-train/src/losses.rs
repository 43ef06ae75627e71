//! Loss functions.
//!
//! All losses reduce to a scalar mean the same way Keras does: the
//! element-wise losses are averaged over the feature axis, then over every
//! remaining axis. For the element-wise losses that is simply the global
//! mean; categorical cross-entropy sums over the class axis first.
//!
//! [`loss_and_grad`] returns the scalar together with `dL/dy_pred`, ready
//! for [`crate::graph::Graph::backward`].

use ndarray::{Array3, Axis, Zip};

use crate::config::LossKind;
use crate::error::{TrainError, TrainResult};

/// Probability clamp for the cross-entropy losses.
pub const EPSILON: f32 = 1e-7;

/// Scalar loss of `pred` against `target`.
pub fn loss(kind: LossKind, pred: &Array3<f32>, target: &Array3<f32>) -> TrainResult<f32> {
    Ok(loss_and_grad(kind, pred, target)?.0)
}

/// Scalar loss and its gradient with respect to `pred`.
///
/// # Errors
///
/// [`TrainError::ShapeMismatch`] when the two tensors differ in shape.
pub fn loss_and_grad(
    kind: LossKind,
    pred: &Array3<f32>,
    target: &Array3<f32>,
) -> TrainResult<(f32, Array3<f32>)> {
    if pred.shape() != target.shape() {
        return Err(TrainError::shape_mismatch(target.shape().to_vec(), pred.shape().to_vec()));
    }
    let n = pred.len().max(1) as f32;
    let (value, grad) = match kind {
        LossKind::MeanSquaredError => {
            let diff = pred - target;
            let value = diff.iter().map(|d| d * d).sum::<f32>() / n;
            (value, diff.mapv(|d| 2.0 * d / n))
        }
        LossKind::MeanAbsoluteError => {
            let diff = pred - target;
            let value = diff.iter().map(|d| d.abs()).sum::<f32>() / n;
            (value, diff.mapv(|d| if d == 0.0 { 0.0 } else { d.signum() / n }))
        }
        LossKind::BinaryCrossentropy => {
            let mut value = 0.0;
            let grad = Zip::from(pred).and(target).map_collect(|&p, &t| {
                let p = p.clamp(EPSILON, 1.0 - EPSILON);
                value -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
                (p - t) / (p * (1.0 - p)) / n
            });
            (value / n, grad)
        }
        LossKind::CategoricalCrossentropy => {
            let rows = (pred.len() / pred.len_of(Axis(2)).max(1)).max(1) as f32;
            let mut value = 0.0;
            let grad = Zip::from(pred).and(target).map_collect(|&p, &t| {
                let p = p.clamp(EPSILON, 1.0);
                value -= t * p.ln();
                -t / p / rows
            });
            (value / rows, grad)
        }
    };
    Ok((value, grad))
}
