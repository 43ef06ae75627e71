//! Optimizers for autoencoder training.
//!
//! Every parameter tensor gets its own optimizer instance (and therefore its
//! own moment buffers); [`ParamOptimizers`] keeps them aligned with the
//! model's layer table.

use crate::config::{ArchitectureConfig, OptimizerKind};
use crate::error::{TrainError, TrainResult};
use crate::layers::Layer;

/// Optimizer trait for parameter updates
pub trait Optimizer: Send + Sync {
    /// Update parameters using gradients
    fn step(&mut self, params: &mut [f32], gradients: &[f32]);
}

/// Adam with bias correction and time-based decay.
///
/// The step size at update `t` (1-based) is `lr / (1 + decay * (t - 1))`.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    decay: f32,
    m: Vec<f32>, // First moment
    v: Vec<f32>, // Second moment
    t: usize,    // Timestep
}

impl Adam {
    /// Adam for a tensor of `dim` scalars.
    pub fn new(dim: usize, lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            decay: 0.0,
            m: vec![0.0; dim],
            v: vec![0.0; dim],
            t: 0,
        }
    }

    /// Set the time-based learning-rate decay.
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    /// Step size used by the next call to [`Optimizer::step`].
    pub fn current_lr(&self) -> f32 {
        self.lr / (1.0 + self.decay * self.t as f32)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: &mut [f32], gradients: &[f32]) {
        if self.m.len() != params.len() {
            self.m = vec![0.0; params.len()];
            self.v = vec![0.0; params.len()];
        }

        let lr = self.current_lr();
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for i in 0..params.len() {
            let g = gradients[i];

            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * g;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = self.m[i] / bias_correction1;
            let v_hat = self.v[i] / bias_correction2;

            params[i] -= lr * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

/// Adadelta: per-coordinate step sizes from running averages of squared
/// gradients and squared updates.
pub struct Adadelta {
    lr: f32,
    rho: f32,
    epsilon: f32,
    acc_grad: Vec<f32>,
    acc_update: Vec<f32>,
}

impl Adadelta {
    /// Adadelta for a tensor of `dim` scalars, `rho = 0.95`.
    pub fn new(dim: usize, lr: f32) -> Self {
        Self {
            lr,
            rho: 0.95,
            epsilon: 1e-7,
            acc_grad: vec![0.0; dim],
            acc_update: vec![0.0; dim],
        }
    }
}

impl Optimizer for Adadelta {
    fn step(&mut self, params: &mut [f32], gradients: &[f32]) {
        if self.acc_grad.len() != params.len() {
            self.acc_grad = vec![0.0; params.len()];
            self.acc_update = vec![0.0; params.len()];
        }
        for i in 0..params.len() {
            let g = gradients[i];
            self.acc_grad[i] = self.rho * self.acc_grad[i] + (1.0 - self.rho) * g * g;
            let update = g * (self.acc_update[i] + self.epsilon).sqrt()
                / (self.acc_grad[i] + self.epsilon).sqrt();
            params[i] -= self.lr * update;
            self.acc_update[i] =
                self.rho * self.acc_update[i] + (1.0 - self.rho) * update * update;
        }
    }
}

/// Build one optimizer for a tensor of `dim` scalars.
///
/// Adam decays its learning rate by `lr / epochs` per update.
pub fn build_optimizer(config: &ArchitectureConfig, dim: usize) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => {
            let decay = config.lr / config.epochs.max(1) as f32;
            Box::new(Adam::new(dim, config.lr).with_decay(decay))
        }
        OptimizerKind::Adadelta => Box::new(Adadelta::new(dim, config.lr)),
    }
}

/// One optimizer per parameter tensor of a layer table.
pub struct ParamOptimizers {
    slots: Vec<Box<dyn Optimizer>>,
}

impl ParamOptimizers {
    /// Two slots (weight, bias) per layer.
    pub fn new(config: &ArchitectureConfig, layers: &mut [Layer]) -> TrainResult<Self> {
        let mut slots = Vec::with_capacity(2 * layers.len());
        for layer in layers.iter_mut() {
            let pairs = layer.param_slices().ok_or_else(non_contiguous)?;
            for (params, _) in pairs {
                slots.push(build_optimizer(config, params.len()));
            }
        }
        Ok(ParamOptimizers { slots })
    }

    /// Apply one update to every layer from its accumulated gradients.
    pub fn step(&mut self, layers: &mut [Layer]) -> TrainResult<()> {
        let mut slots = self.slots.iter_mut();
        for layer in layers.iter_mut() {
            let pairs = layer.param_slices().ok_or_else(non_contiguous)?;
            for (params, grads) in pairs {
                let opt = slots
                    .next()
                    .ok_or_else(|| TrainError::training_step("optimizer/layer count mismatch"))?;
                opt.step(params, grads);
            }
        }
        Ok(())
    }
}

fn non_contiguous() -> TrainError {
    TrainError::training_step("parameter buffer is not contiguous")
}
