//! Per-epoch training metrics.
//!
//! [`MetricsAccumulator`] collects accuracy, precision and recall over the
//! mini-batches of one epoch. Classifier outputs are scored by arg-max;
//! reconstructions are scored element-wise at a 0.5 threshold, which is what
//! a generic `accuracy` metric reduces to on a sigmoid-range output.

use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// Threshold for turning scores into binary decisions.
pub const THRESHOLD: f32 = 0.5;

// ---------------------------------------------------------------------------
// EpochMetrics / History
// ---------------------------------------------------------------------------

/// Metrics for one completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Sample-weighted mean training loss.
    pub loss: f32,
    /// Training accuracy.
    pub accuracy: f32,
    /// Training precision at [`THRESHOLD`].
    pub precision: f32,
    /// Training recall at [`THRESHOLD`].
    pub recall: f32,
    /// Loss on the held-out set, when one was given.
    pub val_loss: Option<f32>,
}

impl EpochMetrics {
    /// A human-readable summary line suitable for logging.
    pub fn summary(&self) -> String {
        let val = self.val_loss.map(|v| format!("  val_loss={v:.5}")).unwrap_or_default();
        format!(
            "epoch {}: loss={:.5}  acc={:.4}  precision={:.4}  recall={:.4}{val}",
            self.epoch, self.loss, self.accuracy, self.precision, self.recall
        )
    }
}

/// Per-epoch metric history of a training run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// One entry per completed epoch, in order.
    pub epochs: Vec<EpochMetrics>,
}

impl History {
    /// Loss of the last epoch.
    pub fn final_loss(&self) -> Option<f32> {
        self.epochs.last().map(|e| e.loss)
    }

    /// Series of one metric across epochs, e.g. `history.series(|e| e.recall)`.
    pub fn series(&self, f: impl Fn(&EpochMetrics) -> f32) -> Vec<f32> {
        self.epochs.iter().map(f).collect()
    }
}

// ---------------------------------------------------------------------------
// MetricsAccumulator
// ---------------------------------------------------------------------------

/// Running counts for one epoch.
///
/// Call [`MetricsAccumulator::update`] for each mini-batch, then
/// [`MetricsAccumulator::finalize`].
#[derive(Debug, Clone, Default)]
pub struct MetricsAccumulator {
    loss_sum: f64,
    num_samples: usize,
    correct: usize,
    scored: usize,
    true_pos: usize,
    false_pos: usize,
    false_neg: usize,
}

impl MetricsAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one mini-batch.
    ///
    /// `batch_loss` is the mean loss of the batch; it is weighted by the
    /// batch size. Set `classifier` for one-hot targets.
    pub fn update(
        &mut self,
        batch_loss: f32,
        pred: &Array3<f32>,
        target: &Array3<f32>,
        classifier: bool,
    ) {
        let batch = pred.len_of(Axis(0));
        self.loss_sum += f64::from(batch_loss) * batch as f64;
        self.num_samples += batch;

        if classifier {
            for (p, t) in pred.lanes(Axis(2)).into_iter().zip(target.lanes(Axis(2))) {
                self.scored += 1;
                if argmax(p.iter()) == argmax(t.iter()) {
                    self.correct += 1;
                }
            }
        } else {
            for (&p, &t) in pred.iter().zip(target.iter()) {
                self.scored += 1;
                if (p > THRESHOLD) == (t > THRESHOLD) {
                    self.correct += 1;
                }
            }
        }

        for (&p, &t) in pred.iter().zip(target.iter()) {
            match (p > THRESHOLD, t > THRESHOLD) {
                (true, true) => self.true_pos += 1,
                (true, false) => self.false_pos += 1,
                (false, true) => self.false_neg += 1,
                (false, false) => {}
            }
        }
    }

    /// Number of samples seen.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Aggregate into [`EpochMetrics`]. Returns `None` before any update.
    pub fn finalize(&self, epoch: usize, val_loss: Option<f32>) -> Option<EpochMetrics> {
        if self.num_samples == 0 {
            return None;
        }
        Some(EpochMetrics {
            epoch,
            loss: (self.loss_sum / self.num_samples as f64) as f32,
            accuracy: ratio(self.correct, self.scored),
            precision: ratio(self.true_pos, self.true_pos + self.false_pos),
            recall: ratio(self.true_pos, self.true_pos + self.false_neg),
            val_loss,
        })
    }

    /// Reset to the empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

fn argmax<'a>(values: impl Iterator<Item = &'a f32>) -> usize {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}
