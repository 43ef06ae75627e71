//! Shape laws of the architecture builder and its lowering.

use ndarray::Array3;
use proptest::prelude::*;
use tess_lc_train::architecture::{output_shape, Blueprint, BuildOptions, Head};
use tess_lc_train::config::{ArchitectureConfig, Variant};
use tess_lc_train::Model;

fn conv_config(stages: usize, filters: Vec<usize>, kernels: Vec<usize>) -> ArchitectureConfig {
    ArchitectureConfig {
        num_conv_layers: 2 * stages,
        num_filters: filters,
        kernel_size: kernels,
        latent_dim: 4,
        ..Default::default()
    }
}

proptest! {
    /// The decoder returns exactly the encoder's input length.
    #[test]
    fn decoder_output_matches_input_length(
        stages in 1usize..4,
        blocks in 1usize..12,
        filters in proptest::collection::vec(1usize..9, 6),
        kernels in proptest::collection::vec(1usize..8, 6),
    ) {
        let len = blocks << stages;
        let cfg = conv_config(stages, filters, kernels);
        let bp = Blueprint::build(&cfg, len, BuildOptions::default()).unwrap();
        let latent = output_shape(&bp.encoder, (len, 1));
        prop_assert_eq!(latent, (1, cfg.latent_dim));
        let Head::Decoder(branches) = &bp.head else { panic!("decoder expected") };
        prop_assert_eq!(output_shape(&branches[0], latent), (len, 1));
    }

    /// Lengths that are not multiples of `2^S` are rejected, never padded.
    #[test]
    fn indivisible_lengths_fail(stages in 1usize..4, len in 1usize..200) {
        let cfg = conv_config(stages, vec![2; 6], vec![3; 6]);
        let built = Blueprint::build(&cfg, len, BuildOptions::default());
        prop_assert_eq!(built.is_ok(), len % (1 << stages) == 0);
    }
}

#[test]
fn lowered_model_reconstructs_input_shape() {
    let cfg = conv_config(3, vec![4, 8, 4, 4, 8, 4], vec![5, 3, 3, 3, 3, 5]);
    let model = Model::build(&cfg, 64, BuildOptions::default()).unwrap();
    let x = Array3::from_shape_fn((3, 64, 1), |(_, t, _)| (t as f32 * 0.2).sin());
    assert_eq!(model.predict(x.view(), None).unwrap().shape(), &[3, 64, 1]);
    assert_eq!(model.encode(x.view(), None).unwrap().shape(), &[3, 4]);
}

#[test]
fn split_model_reconstructs_both_segments() {
    let cfg = ArchitectureConfig {
        variant: Variant::Split { orbit_gap: [40, 44] },
        ..conv_config(2, vec![4, 4, 4, 4], vec![3, 3, 3, 3])
    };
    let model = Model::build(&cfg, 64, BuildOptions::default()).unwrap();
    let x = Array3::from_elem((2, 64, 1), 0.3);
    let out = model.predict(x.view(), None).unwrap();
    assert_eq!(out.shape(), &[2, 60, 1]);
    assert_eq!(model.target_for(x.view()).unwrap().shape(), out.shape());
}

#[test]
fn simple_variant_has_no_convolutions() {
    let cfg = ArchitectureConfig {
        variant: Variant::Simple,
        ..conv_config(1, vec![1; 2], vec![1; 2])
    };
    let model = Model::build(&cfg, 37, BuildOptions::default()).unwrap();
    assert!(model.layers().iter().all(|l| matches!(l, tess_lc_train::layers::Layer::Dense(_))));
    let x = Array3::zeros((1, 37, 1));
    assert_eq!(model.predict(x.view(), None).unwrap().shape(), &[1, 37, 1]);
}
