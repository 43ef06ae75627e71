//! Benchmarks for the autoencoder forward and training passes.
//!
//! Inputs are deterministic ramps; weights come from the config seed.
//!
//! Run with:
//!
//! ```bash
//! cargo bench -p tess-lc-train
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array3;
use tess_lc_train::{ArchitectureConfig, BuildOptions, LossKind, Model};

fn ramp(batch: usize, len: usize) -> Array3<f32> {
    Array3::from_shape_fn((batch, len, 1), |(b, t, _)| ((b + t) % 97) as f32 * 0.01)
}

/// Inference over one mini-batch of 2-minute-cadence-sized series.
fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    let cfg = ArchitectureConfig::default();
    for len in [1024_usize, 4096, 16384] {
        let model = Model::build(&cfg, len, BuildOptions::default()).expect("model");
        let x = ramp(32, len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            b.iter(|| model.predict(black_box(x.view()), None).expect("predict"));
        });
    }
    group.finish();
}

/// One optimisation step (forward, backward, Adam update).
fn bench_train_step(c: &mut Criterion) {
    let cfg = ArchitectureConfig::default();
    let mut model = Model::build(&cfg, 1024, BuildOptions::default()).expect("model");
    let mut optimizers = model.optimizers(&cfg).expect("optimizers");
    let x = ramp(cfg.batch_size, 1024);
    let target = model.target_for(x.view()).expect("target");
    c.bench_function("train_step_1024x128", |b| {
        b.iter(|| {
            model
                .train_step(
                    black_box(x.view()),
                    None,
                    &target,
                    LossKind::MeanSquaredError,
                    &mut optimizers,
                )
                .expect("step")
        });
    });
}

criterion_group!(benches, bench_predict, bench_train_step);
criterion_main!(benches);
