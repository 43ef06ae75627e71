//! End-to-end training scenarios on synthetic light curves.

use ndarray::{concatenate, Array1, Array2, Axis};
use tess_lc_signal::standardize;
use tess_lc_train::config::{Activation, ArchitectureConfig, LossKind, OptimizerKind, Variant};
use tess_lc_train::dataset::{signal_data, SyntheticConfig, TrainingData};
use tess_lc_train::{TrainError, Trainer};

/// Full-batch logistic regression; returns training accuracy.
fn logistic_accuracy(x: &Array2<f32>, labels: &[f32]) -> f32 {
    let (n, d) = x.dim();
    let mut w = Array1::<f32>::zeros(d);
    let mut b = 0.0_f32;
    let lr = 0.5;
    for _ in 0..1000 {
        let z = x.dot(&w) + b;
        let p = z.mapv(|v| 1.0 / (1.0 + (-v).exp()));
        let err = &p - &Array1::from(labels.to_vec());
        w = &w - &(x.t().dot(&err) * (lr / n as f32));
        b -= lr * err.sum() / n as f32;
    }
    let z = x.dot(&w) + b;
    let correct = z.iter().zip(labels).filter(|&(&v, &y)| (v > 0.0) == (y > 0.5)).count();
    correct as f32 / n as f32
}

/// 200 flat and 200 bump curves of length 100; one epoch with a
/// two-dimensional bottleneck separates the classes linearly.
#[test]
fn one_epoch_latent_space_separates_flat_from_bump() {
    let syn = signal_data(&SyntheticConfig {
        training_size: 360,
        test_size: 40,
        input_dim: 100,
        ..Default::default()
    })
    .unwrap();
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![8, 8],
        kernel_size: vec![3, 3],
        activation: Activation::Tanh,
        last_activation: Activation::Sigmoid,
        latent_dim: 2,
        dropout: 0.1,
        optimizer: OptimizerKind::Adam,
        lr: 0.01,
        batch_size: 8,
        epochs: 1,
        losses: LossKind::MeanSquaredError,
        ..Default::default()
    };

    let data = TrainingData::unsupervised(syn.x_train.clone(), syn.x_test.clone());
    let out = Trainer::new(cfg).run(&data).unwrap();
    assert_eq!(out.history.epochs.len(), 1);

    let all_x = concatenate(Axis(0), &[syn.x_train.view(), syn.x_test.view()]).unwrap();
    let all_y = concatenate(Axis(0), &[syn.y_train.view(), syn.y_test.view()]).unwrap();
    let latent = out.model.encode(all_x.view(), None).unwrap();
    assert_eq!(latent.shape(), &[400, 2]);
    assert!(latent.iter().all(|v| v.is_finite()));

    // Standardise each latent dimension across objects.
    let features = standardize(latent.t()).unwrap().t().to_owned();
    let labels: Vec<f32> = all_y.column(1).to_vec();
    let acc = logistic_accuracy(&features, &labels);
    assert!(acc > 0.95, "latent accuracy {acc}");
}

#[test]
fn split_variant_trains_on_concatenated_segments() {
    let syn = signal_data(&SyntheticConfig {
        training_size: 16,
        test_size: 4,
        input_dim: 64,
        ..Default::default()
    })
    .unwrap();
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![4, 4],
        kernel_size: vec![3, 3],
        latent_dim: 3,
        batch_size: 4,
        epochs: 2,
        variant: Variant::Split { orbit_gap: [30, 32] },
        ..Default::default()
    };
    let data = TrainingData::unsupervised(syn.x_train, syn.x_test);
    let out = Trainer::new(cfg).run(&data).unwrap();
    assert!(out.history.epochs.iter().all(|e| e.loss.is_finite()));
    let recon = out.model.predict(data.x_test.view(), None).unwrap();
    assert_eq!(recon.shape(), &[4, 62, 1]);
}

#[test]
fn rms_side_channel_classifier() {
    let syn = signal_data(&SyntheticConfig {
        training_size: 24,
        test_size: 8,
        input_dim: 32,
        ..Default::default()
    })
    .unwrap();
    let data = syn.into_training_data().with_rms_side_channel().unwrap();
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![4, 4],
        kernel_size: vec![3, 3],
        latent_dim: 4,
        batch_size: 8,
        epochs: 3,
        lr: 0.01,
        losses: LossKind::CategoricalCrossentropy,
        ..Default::default()
    };
    let out = Trainer::new(cfg).run(&data).unwrap();
    assert!(out.model.blueprint().side.is_some());

    let side = data.side_test.as_ref().unwrap();
    let probs = out.model.predict(data.x_test.view(), Some(side.view())).unwrap();
    assert_eq!(probs.shape(), &[8, 1, 2]);
    for row in probs.lanes(Axis(2)) {
        approx::assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
    }
    for e in &out.history.epochs {
        assert!((0.0..=1.0).contains(&e.accuracy));
        assert!(e.val_loss.is_some());
    }
    let outputs = out.model.layer_outputs(data.x_test.view(), Some(side.view())).unwrap();
    assert!(outputs.iter().any(|o| o.name == "fusion/dense"));
}

#[test]
fn classifier_without_side_features_is_rejected_at_inference() {
    let syn = signal_data(&SyntheticConfig {
        training_size: 8,
        test_size: 0,
        input_dim: 16,
        ..Default::default()
    })
    .unwrap();
    let data = syn.into_training_data().with_rms_side_channel().unwrap();
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![2, 2],
        kernel_size: vec![3, 3],
        epochs: 1,
        ..Default::default()
    };
    let trainer = Trainer::new(cfg);
    let model = trainer.build_model(&data).unwrap();
    assert!(matches!(model.predict(data.x_train.view(), None), Err(TrainError::MissingInput(_))));
}

#[test]
fn overflowing_flux_is_reported_as_divergence() {
    let syn = signal_data(&SyntheticConfig {
        training_size: 16,
        test_size: 0,
        input_dim: 16,
        ..Default::default()
    })
    .unwrap();
    let mut x = syn.x_train;
    x.mapv_inplace(|v| v * f32::MAX);
    let data = TrainingData::unsupervised(x, ndarray::Array3::zeros((0, 16, 1)));
    let cfg = ArchitectureConfig {
        num_conv_layers: 2,
        num_filters: vec![2, 2],
        kernel_size: vec![3, 3],
        activation: Activation::Relu,
        batch_size: 16,
        epochs: 1,
        ..Default::default()
    };
    let err = Trainer::new(cfg).run(&data).unwrap_err();
    assert!(matches!(err, TrainError::Diverged { epoch: 0, batch: 0 }));
}
