//! Training tensors and synthetic light-curve generators.
//!
//! [`TrainingData`] bundles everything a fit needs: flux tensors, optional
//! one-hot labels and optional side-channel features, each split into train
//! and test rows. It is usually built from a
//! [`TrainTestSplit`](tess_lc_signal::TrainTestSplit); [`signal_data`] and
//! [`no_signal_data`] produce reproducible synthetic sets for smoke tests
//! and dry runs.

use ndarray::{concatenate, s, Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tess_lc_signal::{rms, TrainTestSplit};

use crate::error::{ConfigError, TrainError, TrainResult};

// ---------------------------------------------------------------------------
// TrainingData
// ---------------------------------------------------------------------------

/// Tensors for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    /// `[N_train, L, 1]`
    pub x_train: Array3<f32>,
    /// `[N_test, L, 1]`; may hold zero rows.
    pub x_test: Array3<f32>,
    /// One-hot labels for supervised training.
    pub y_train: Option<Array2<f32>>,
    /// One-hot labels for the test rows.
    pub y_test: Option<Array2<f32>>,
    /// Side-channel features, `[N_train, d]`.
    pub side_train: Option<Array2<f32>>,
    /// Side-channel features, `[N_test, d]`.
    pub side_test: Option<Array2<f32>>,
}

impl TrainingData {
    /// Reconstruction data: no labels, no side channel.
    pub fn unsupervised(x_train: Array3<f32>, x_test: Array3<f32>) -> Self {
        TrainingData {
            x_train,
            x_test,
            y_train: None,
            y_test: None,
            side_train: None,
            side_test: None,
        }
    }

    /// Take the tensors (and labels, when present) of a preprocessing split.
    pub fn from_split(split: &TrainTestSplit) -> Self {
        TrainingData {
            x_train: split.x_train.clone(),
            x_test: split.x_test.clone(),
            y_train: split.y_train.clone(),
            y_test: split.y_test.clone(),
            side_train: None,
            side_test: None,
        }
    }

    /// Drop the labels, turning a supervised split into reconstruction data.
    pub fn without_labels(mut self) -> Self {
        self.y_train = None;
        self.y_test = None;
        self
    }

    /// Attach side-channel features.
    pub fn with_side_features(
        mut self,
        train: Array2<f32>,
        test: Array2<f32>,
    ) -> TrainResult<Self> {
        self.side_train = Some(train);
        self.side_test = Some(test);
        self.validate()?;
        Ok(self)
    }

    /// Attach each object's flux RMS as a one-feature side channel.
    pub fn with_rms_side_channel(self) -> TrainResult<Self> {
        let train = rms_column(&self.x_train);
        let test = rms_column(&self.x_test);
        self.with_side_features(train, test)
    }

    /// Number of training objects.
    pub fn num_train(&self) -> usize {
        self.x_train.len_of(Axis(0))
    }

    /// Number of test objects.
    pub fn num_test(&self) -> usize {
        self.x_test.len_of(Axis(0))
    }

    /// Series length.
    pub fn series_len(&self) -> usize {
        self.x_train.len_of(Axis(1))
    }

    /// Width of the side channel, if attached.
    pub fn side_features(&self) -> Option<usize> {
        self.side_train.as_ref().map(|s| s.ncols())
    }

    /// Number of label columns, if labelled.
    pub fn num_classes(&self) -> Option<usize> {
        self.y_train.as_ref().map(|y| y.ncols())
    }

    /// Check that every tensor agrees on object counts and widths.
    pub fn validate(&self) -> TrainResult<()> {
        let (n_train, len, ch) = self.x_train.dim();
        if n_train == 0 || len == 0 {
            return Err(TrainError::EmptyDataset);
        }
        let (n_test, test_len, test_ch) = self.x_test.dim();
        if ch != 1 || test_ch != 1 || (n_test > 0 && test_len != len) {
            return Err(TrainError::shape_mismatch(
                vec![n_test, len, 1],
                vec![n_test, test_len, test_ch],
            ));
        }
        check_pair(
            "labels",
            self.y_train.as_ref(),
            self.y_test.as_ref(),
            n_train,
            n_test,
        )?;
        check_pair(
            "side features",
            self.side_train.as_ref(),
            self.side_test.as_ref(),
            n_train,
            n_test,
        )?;
        Ok(())
    }
}

fn rms_column(x: &Array3<f32>) -> Array2<f32> {
    let flat = x.index_axis(Axis(2), 0);
    rms(flat).insert_axis(Axis(1))
}

fn check_pair(
    what: &'static str,
    train: Option<&Array2<f32>>,
    test: Option<&Array2<f32>>,
    n_train: usize,
    n_test: usize,
) -> TrainResult<()> {
    match (train, test) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) => {
            if a.nrows() != n_train {
                return Err(TrainError::shape_mismatch(
                    vec![n_train, a.ncols()],
                    a.shape().to_vec(),
                ));
            }
            if b.nrows() != n_test || (n_test > 0 && b.ncols() != a.ncols()) {
                return Err(TrainError::shape_mismatch(vec![n_test, a.ncols()], b.shape().to_vec()));
            }
            Ok(())
        }
        _ => Err(TrainError::MissingInput(what)),
    }
}

/// Shuffle `0..n` and cut it into consecutive batches of `batch_size`
/// (the last batch may be short).
pub fn shuffled_batches<R: Rng + ?Sized>(
    n: usize,
    batch_size: usize,
    rng: &mut R,
) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order.chunks(batch_size.max(1)).map(<[usize]>::to_vec).collect()
}

// ---------------------------------------------------------------------------
// Synthetic data
// ---------------------------------------------------------------------------

/// Parameters of the synthetic generators.
///
/// Half the objects are flat, half carry a Gaussian bump of height
/// `height + h_factor·N(0,1)` centred at `center + center_factor·N(0,1)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Objects in the training partition (half per class).
    pub training_size: usize,
    /// Objects in the test partition (half per class).
    pub test_size: usize,
    /// Samples per light curve.
    pub input_dim: usize,
    /// End of the time axis; it starts at 0.
    pub time_max: f64,
    /// Standard deviation of the additive noise.
    pub noise_level: f32,
    /// Mean bump height.
    pub height: f32,
    /// Mean bump centre, in time units.
    pub center: f32,
    /// Bump width.
    pub stdev: f32,
    /// Spread of the bump height.
    pub h_factor: f32,
    /// Spread of the bump centre.
    pub center_factor: f32,
    /// Flat curves sit at 0 when `true`, at 1 otherwise.
    pub min0max1: bool,
    /// Generator seed.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            training_size: 10_000,
            test_size: 100,
            input_dim: 100,
            time_max: 30.0,
            noise_level: 0.0,
            height: 1.0,
            center: 15.0,
            stdev: 0.8,
            h_factor: 0.2,
            center_factor: 5.0,
            min0max1: true,
            seed: 42,
        }
    }
}

impl SyntheticConfig {
    /// Reject sizes that cannot be split into two equal classes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training_size == 0 || self.training_size % 2 != 0 {
            return Err(ConfigError::invalid_value("training_size", "must be even and > 0"));
        }
        if self.test_size % 2 != 0 {
            return Err(ConfigError::invalid_value("test_size", "must be even"));
        }
        if self.input_dim < 2 {
            return Err(ConfigError::invalid_value("input_dim", "must be >= 2"));
        }
        if self.stdev <= 0.0 {
            return Err(ConfigError::invalid_value("stdev", "must be > 0"));
        }
        if self.noise_level < 0.0 {
            return Err(ConfigError::invalid_value("noise_level", "must be >= 0"));
        }
        Ok(())
    }
}

/// Generated light curves.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticData {
    /// Shared time axis, `input_dim` points on `[0, time_max]`.
    pub time: Array1<f64>,
    /// `[training_size, input_dim, 1]`
    pub x_train: Array3<f32>,
    /// One-hot `[training_size, 2]`; column 0 is flat, column 1 is bump.
    pub y_train: Array2<f32>,
    /// `[test_size, input_dim, 1]`
    pub x_test: Array3<f32>,
    /// One-hot `[test_size, 2]`.
    pub y_test: Array2<f32>,
}

impl SyntheticData {
    /// View as labelled training data.
    pub fn into_training_data(self) -> TrainingData {
        TrainingData {
            x_train: self.x_train,
            x_test: self.x_test,
            y_train: Some(self.y_train),
            y_test: Some(self.y_test),
            side_train: None,
            side_test: None,
        }
    }
}

/// `a · exp(-(x - b)² / 2c²)`
pub fn gaussian(x: f64, a: f64, b: f64, c: f64) -> f64 {
    a * (-(x - b).powi(2) / (2.0 * c * c)).exp()
}

/// Half flat, half Gaussian-bump light curves.
///
/// Rows are generated flat-first, then bumps; each class contributes
/// `training_size / 2` leading rows to the training partition and its
/// remaining rows to the test partition.
pub fn signal_data(config: &SyntheticConfig) -> TrainResult<SyntheticData> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let time = Array1::linspace(0.0, config.time_max, config.input_dim);
    let half = (config.training_size + config.test_size) / 2;

    let mut x = Array2::<f32>::zeros((2 * half, config.input_dim));
    let mut y = Array2::<f32>::zeros((2 * half, 2));
    y.slice_mut(s![..half, 0]).fill(1.0);
    y.slice_mut(s![half.., 1]).fill(1.0);

    for mut row in x.slice_mut(s![half.., ..]).rows_mut() {
        let h: f64 = rng.sample(StandardNormal);
        let c: f64 = rng.sample(StandardNormal);
        let a = f64::from(config.height) + f64::from(config.h_factor) * h;
        let b = f64::from(config.center) + f64::from(config.center_factor) * c;
        for (v, &t) in row.iter_mut().zip(time.iter()) {
            *v = gaussian(t, a, b, f64::from(config.stdev)) as f32;
        }
    }
    add_noise(&mut x, config.noise_level, &mut rng);

    let (x_train, x_test) = partition(&x, config)?;
    let (y_train, y_test) = partition(&y, config)?;
    Ok(SyntheticData {
        time,
        x_train: to_tensor(x_train),
        y_train,
        x_test: to_tensor(x_test),
        y_test,
    })
}

/// Flat light curves only (0, or 1 when `min0max1` is off), plus noise.
/// Every label is class 0.
pub fn no_signal_data(config: &SyntheticConfig) -> TrainResult<SyntheticData> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let time = Array1::linspace(0.0, config.time_max, config.input_dim);
    let total = config.training_size + config.test_size;

    let level = if config.min0max1 { 0.0 } else { 1.0 };
    let mut x = Array2::<f32>::from_elem((total, config.input_dim), level);
    let mut y = Array2::<f32>::zeros((total, 2));
    y.column_mut(0).fill(1.0);
    add_noise(&mut x, config.noise_level, &mut rng);

    let (x_train, x_test) = partition(&x, config)?;
    let (y_train, y_test) = partition(&y, config)?;
    Ok(SyntheticData {
        time,
        x_train: to_tensor(x_train),
        y_train,
        x_test: to_tensor(x_test),
        y_test,
    })
}

fn add_noise<R: Rng + ?Sized>(x: &mut Array2<f32>, level: f32, rng: &mut R) {
    if level > 0.0 {
        x.mapv_inplace(|v| v + level * rng.sample::<f32, _>(StandardNormal));
    }
}

/// Rows `[0, tr/2) ∪ [half, total - te/2)` train, the rest test.
fn partition(x: &Array2<f32>, config: &SyntheticConfig) -> TrainResult<(Array2<f32>, Array2<f32>)> {
    let total = x.nrows();
    let half = total / 2;
    let (tr, te) = (config.training_size / 2, config.test_size / 2);
    let train_parts = [x.slice(s![0..tr, ..]), x.slice(s![half..total - te, ..])];
    let train = concatenate(Axis(0), &train_parts)
        .map_err(|e| TrainError::training_step(e.to_string()))?;
    let test_parts = [x.slice(s![tr..half, ..]), x.slice(s![total - te..total, ..])];
    let test = concatenate(Axis(0), &test_parts)
        .map_err(|e| TrainError::training_step(e.to_string()))?;
    Ok((train, test))
}

fn to_tensor(x: Array2<f32>) -> Array3<f32> {
    x.insert_axis(Axis(2))
}
