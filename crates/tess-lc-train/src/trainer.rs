//! Training loop orchestrator.
//!
//! [`Trainer::fit`] runs exactly `config.epochs` passes over the training
//! set in shuffled mini-batches, updating after every batch. There is no
//! early stopping and no checkpointing; the held-out loss is reported per
//! epoch but never feeds back into the weights.

use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::architecture::BuildOptions;
use crate::config::ArchitectureConfig;
use crate::dataset::{shuffled_batches, TrainingData};
use crate::error::{TrainError, TrainResult};
use crate::metrics::{History, MetricsAccumulator};
use crate::model::Model;

/// A trained model and its metric history.
#[derive(Debug, Clone)]
pub struct TrainOutput {
    /// The fitted network.
    pub model: Model,
    /// One entry per epoch.
    pub history: History,
}

/// Builds and fits autoencoders for one configuration.
pub struct Trainer {
    config: ArchitectureConfig,
}

impl Trainer {
    /// Create a new `Trainer` from the given configuration.
    pub fn new(config: ArchitectureConfig) -> Self {
        Trainer { config }
    }

    /// Return a reference to the active training configuration.
    pub fn config(&self) -> &ArchitectureConfig {
        &self.config
    }

    /// Blueprint options implied by `data`: a side channel when side
    /// features are attached, a classifier head when labels are.
    pub fn build_options(data: &TrainingData) -> BuildOptions {
        BuildOptions {
            side_features: data.side_features(),
            num_classes: data.num_classes(),
        }
    }

    /// Build a model sized for `data`.
    pub fn build_model(&self, data: &TrainingData) -> TrainResult<Model> {
        data.validate()?;
        Model::build(&self.config, data.series_len(), Self::build_options(data))
    }

    /// Build a model for `data` and fit it.
    pub fn run(&self, data: &TrainingData) -> TrainResult<TrainOutput> {
        let mut model = self.build_model(data)?;
        let history = self.fit(&mut model, data)?;
        Ok(TrainOutput { model, history })
    }

    /// Fit `model` on `data` for the configured number of epochs.
    ///
    /// # Errors
    ///
    /// [`TrainError::Diverged`] as soon as a mini-batch loss is NaN or
    /// infinite; shape errors when `data` does not match the model.
    pub fn fit(&self, model: &mut Model, data: &TrainingData) -> TrainResult<History> {
        data.validate()?;
        let classifier = model.blueprint().is_classifier();
        if classifier && data.y_train.is_none() {
            return Err(TrainError::MissingInput("labels"));
        }

        let train_target = self.target(model, &data.x_train, data.y_train.as_ref(), classifier)?;
        let test_target = if data.num_test() > 0 {
            Some(self.target(model, &data.x_test, data.y_test.as_ref(), classifier)?)
        } else {
            None
        };

        let mut optimizers = model.optimizers(&self.config)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        let mut history = History::default();
        let n = data.num_train();

        info!(
            objects = n,
            held_out = data.num_test(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            classifier,
            "starting fit"
        );

        for epoch in 0..self.config.epochs {
            let mut acc = MetricsAccumulator::new();
            let batches = shuffled_batches(n, self.config.batch_size, &mut rng);
            for (batch, rows) in batches.iter().enumerate() {
                let x = data.x_train.select(Axis(0), rows);
                let side = data.side_train.as_ref().map(|s| s.select(Axis(0), rows));
                let target = train_target.select(Axis(0), rows);
                let step = model.train_step(
                    x.view(),
                    side.as_ref().map(|s| s.view()),
                    &target,
                    self.config.losses,
                    &mut optimizers,
                )?;
                if !step.loss.is_finite() {
                    return Err(TrainError::Diverged { epoch, batch });
                }
                acc.update(step.loss, &step.prediction, &target, classifier);
            }
            debug!(epoch, samples = acc.num_samples(), "epoch done");

            let val_loss = match &test_target {
                Some(target) => Some(model.evaluate(
                    data.x_test.view(),
                    data.side_test.as_ref().map(|s| s.view()),
                    target,
                    self.config.losses,
                )?),
                None => None,
            };
            let metrics = acc.finalize(epoch, val_loss).ok_or(TrainError::EmptyDataset)?;
            info!("{}", metrics.summary());
            history.epochs.push(metrics);
        }
        Ok(history)
    }

    fn target(
        &self,
        model: &Model,
        x: &Array3<f32>,
        y: Option<&Array2<f32>>,
        classifier: bool,
    ) -> TrainResult<Array3<f32>> {
        match (classifier, y) {
            (true, Some(y)) => Ok(y.clone().insert_axis(Axis(1))),
            (true, None) => Err(TrainError::MissingInput("labels")),
            (false, _) => model.target_for(x.view()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Activation, LossKind};
    use crate::dataset::{signal_data, SyntheticConfig};

    fn tiny_config() -> ArchitectureConfig {
        ArchitectureConfig {
            num_conv_layers: 2,
            num_filters: vec![4, 4],
            kernel_size: vec![3, 3],
            activation: Activation::Tanh,
            last_activation: Activation::Sigmoid,
            latent_dim: 2,
            batch_size: 4,
            epochs: 2,
            lr: 0.01,
            ..Default::default()
        }
    }

    fn tiny_data() -> TrainingData {
        let syn = SyntheticConfig {
            training_size: 12,
            test_size: 4,
            input_dim: 20,
            ..Default::default()
        };
        signal_data(&syn).unwrap().into_training_data()
    }

    #[test]
    fn history_has_one_entry_per_epoch() {
        let trainer = Trainer::new(tiny_config());
        let out = trainer.run(&tiny_data().without_labels()).unwrap();
        assert_eq!(out.history.epochs.len(), 2);
        assert!(out.history.epochs.iter().all(|e| e.val_loss.is_some()));
        assert!(out.history.final_loss().unwrap().is_finite());
    }

    #[test]
    fn empty_test_set_gives_no_val_loss() {
        let data = tiny_data().without_labels();
        let data = TrainingData::unsupervised(data.x_train, ndarray::Array3::zeros((0, 20, 1)));
        let out = Trainer::new(tiny_config()).run(&data).unwrap();
        assert!(out.history.epochs.iter().all(|e| e.val_loss.is_none()));
    }

    #[test]
    fn labels_select_a_classifier_head() {
        let cfg = ArchitectureConfig { losses: LossKind::CategoricalCrossentropy, ..tiny_config() };
        let out = Trainer::new(cfg).run(&tiny_data()).unwrap();
        assert!(out.model.blueprint().is_classifier());
        let p = out.model.predict(tiny_data().x_test.view(), None).unwrap();
        assert_eq!(p.shape(), &[4, 1, 2]);
    }

    #[test]
    fn nan_input_diverges() {
        let mut data = tiny_data().without_labels();
        data.x_train[[0, 0, 0]] = f32::NAN;
        let err = Trainer::new(tiny_config()).run(&data).unwrap_err();
        assert!(matches!(err, TrainError::Diverged { epoch: 0, .. }));
    }
}
