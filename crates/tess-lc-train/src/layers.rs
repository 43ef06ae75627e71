//! Trainable layers and activation functions.
//!
//! Activations are `[batch, time, channels]` tensors; dense layers work on
//! `[batch, 1, features]`. Every backward function takes the upstream
//! gradient with respect to the layer *output* and returns the gradient
//! with respect to its input, accumulating parameter gradients in the
//! layer's `grad_*` buffers.

use ndarray::{s, Array1, Array2, Array3, ArrayView3, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::config::Activation;

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

impl Activation {
    /// Apply the nonlinearity in place.
    pub fn forward_inplace(self, x: &mut Array3<f32>) {
        match self {
            Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
            Activation::Sigmoid => x.mapv_inplace(sigmoid),
            Activation::Elu => x.mapv_inplace(|v| if v > 0.0 { v } else { v.exp_m1() }),
            Activation::Linear => {}
            Activation::Softmax => {
                for mut row in x.lanes_mut(Axis(2)) {
                    let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    row.mapv_inplace(|v| (v - max).exp());
                    let sum = row.sum();
                    row.mapv_inplace(|v| v / sum);
                }
            }
        }
    }

    /// Gradient with respect to the pre-activation, given the activation
    /// output `y` and the upstream gradient `dy`.
    pub fn backward(self, y: &Array3<f32>, dy: &Array3<f32>) -> Array3<f32> {
        match self {
            Activation::Relu => {
                Zip::from(y).and(dy).map_collect(|&y, &g| if y > 0.0 { g } else { 0.0 })
            }
            Activation::Tanh => Zip::from(y).and(dy).map_collect(|&y, &g| g * (1.0 - y * y)),
            Activation::Sigmoid => Zip::from(y).and(dy).map_collect(|&y, &g| g * y * (1.0 - y)),
            Activation::Elu => {
                Zip::from(y).and(dy).map_collect(|&y, &g| if y > 0.0 { g } else { g * (y + 1.0) })
            }
            Activation::Linear => dy.clone(),
            Activation::Softmax => {
                let mut dx = dy.clone();
                for ((mut d, yr), gr) in dx
                    .lanes_mut(Axis(2))
                    .into_iter()
                    .zip(y.lanes(Axis(2)))
                    .zip(dy.lanes(Axis(2)))
                {
                    let dot: f32 = yr.iter().zip(gr.iter()).map(|(a, b)| a * b).sum();
                    Zip::from(&mut d).and(&yr).and(&gr).for_each(|d, &y, &g| *d = y * (g - dot));
                }
                dx
            }
        }
    }
}

fn sigmoid(v: f32) -> f32 {
    if v >= 0.0 {
        1.0 / (1.0 + (-v).exp())
    } else {
        let e = v.exp();
        e / (1.0 + e)
    }
}

/// Glorot-uniform sample bound, `sqrt(6 / (fan_in + fan_out))`.
fn glorot_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out).max(1) as f32).sqrt()
}

// ---------------------------------------------------------------------------
// Conv1d
// ---------------------------------------------------------------------------

/// Same-padded 1-D convolution, stride 1.
///
/// Padding follows the usual "same" rule: `k - 1` zeros in total, with
/// `(k - 1) / 2` of them on the left.
#[derive(Debug, Clone)]
pub struct Conv1d {
    /// `[kernel, in_channels, out_channels]`
    pub weight: Array3<f32>,
    /// `[out_channels]`
    pub bias: Array1<f32>,
    /// Accumulated weight gradient.
    pub grad_weight: Array3<f32>,
    /// Accumulated bias gradient.
    pub grad_bias: Array1<f32>,
}

impl Conv1d {
    /// Glorot-uniform weights, zero bias.
    pub fn new<R: Rng + ?Sized>(kernel: usize, in_ch: usize, out_ch: usize, rng: &mut R) -> Self {
        let limit = glorot_limit(kernel * in_ch, kernel * out_ch);
        let dist = Uniform::new_inclusive(-limit, limit);
        let weight = Array3::from_shape_simple_fn((kernel, in_ch, out_ch), || dist.sample(rng));
        Conv1d {
            grad_weight: Array3::zeros(weight.raw_dim()),
            weight,
            bias: Array1::zeros(out_ch),
            grad_bias: Array1::zeros(out_ch),
        }
    }

    fn kernel(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Output-time range `[t0, t1)` that reads input `t + shift` for tap `k`.
    fn tap_range(&self, k: usize, len: usize) -> Option<(usize, usize, isize)> {
        let pad_left = (self.kernel() - 1) / 2;
        let shift = k as isize - pad_left as isize;
        let t0 = (-shift).max(0) as usize;
        let t1 = (len as isize - shift).min(len as isize).max(0) as usize;
        (t0 < t1).then_some((t0, t1, shift))
    }

    /// Pre-activation output, `[B, L, out]`.
    pub fn forward(&self, x: ArrayView3<'_, f32>) -> Array3<f32> {
        let (b, len, _) = x.dim();
        let out_ch = self.bias.len();
        let mut out = Array3::zeros((b, len, out_ch));
        for (xb, mut ob) in x.outer_iter().zip(out.outer_iter_mut()) {
            for k in 0..self.kernel() {
                let Some((t0, t1, shift)) = self.tap_range(k, len) else { continue };
                let lo = (t0 as isize + shift) as usize;
                let hi = (t1 as isize + shift) as usize;
                let src = xb.slice(s![lo..hi, ..]);
                let prod = src.dot(&self.weight.index_axis(Axis(0), k));
                let mut dst = ob.slice_mut(s![t0..t1, ..]);
                dst += &prod;
            }
            ob += &self.bias;
        }
        out
    }

    /// Accumulate parameter gradients and return `dL/dx`.
    pub fn backward(&mut self, x: ArrayView3<'_, f32>, dpre: &Array3<f32>) -> Array3<f32> {
        let (_, len, _) = x.dim();
        let mut dx = Array3::zeros(x.raw_dim());
        for ((xb, gb), mut dxb) in x.outer_iter().zip(dpre.outer_iter()).zip(dx.outer_iter_mut()) {
            for k in 0..self.kernel() {
                let Some((t0, t1, shift)) = self.tap_range(k, len) else { continue };
                let range = (t0 as isize + shift) as usize..(t1 as isize + shift) as usize;
                let src = xb.slice(s![range.clone(), ..]);
                let g = gb.slice(s![t0..t1, ..]);
                let mut gw = self.grad_weight.index_axis_mut(Axis(0), k);
                gw += &src.t().dot(&g);
                let mut d = dxb.slice_mut(s![range, ..]);
                d += &g.dot(&self.weight.index_axis(Axis(0), k).t());
            }
            self.grad_bias += &gb.sum_axis(Axis(0));
        }
        dx
    }
}

// ---------------------------------------------------------------------------
// Dense
// ---------------------------------------------------------------------------

/// Fully-connected layer over `[B, 1, in]` tensors.
#[derive(Debug, Clone)]
pub struct Dense {
    /// `[in, out]`
    pub weight: Array2<f32>,
    /// `[out]`
    pub bias: Array1<f32>,
    /// Accumulated weight gradient.
    pub grad_weight: Array2<f32>,
    /// Accumulated bias gradient.
    pub grad_bias: Array1<f32>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    pub fn new<R: Rng + ?Sized>(input: usize, output: usize, rng: &mut R) -> Self {
        let limit = glorot_limit(input, output);
        let dist = Uniform::new_inclusive(-limit, limit);
        let weight = Array2::from_shape_simple_fn((input, output), || dist.sample(rng));
        Dense {
            grad_weight: Array2::zeros(weight.raw_dim()),
            weight,
            bias: Array1::zeros(output),
            grad_bias: Array1::zeros(output),
        }
    }

    /// Pre-activation output, `[B, 1, out]`.
    pub fn forward(&self, x: ArrayView3<'_, f32>) -> Array3<f32> {
        let x2 = x.index_axis(Axis(1), 0);
        let y = x2.dot(&self.weight) + &self.bias;
        y.insert_axis(Axis(1))
    }

    /// Accumulate parameter gradients and return `dL/dx`.
    pub fn backward(&mut self, x: ArrayView3<'_, f32>, dpre: &Array3<f32>) -> Array3<f32> {
        let x2 = x.index_axis(Axis(1), 0);
        let g = dpre.index_axis(Axis(1), 0);
        self.grad_weight += &x2.t().dot(&g);
        self.grad_bias += &g.sum_axis(Axis(0));
        g.dot(&self.weight.t()).insert_axis(Axis(1))
    }
}

// ---------------------------------------------------------------------------
// Layer
// ---------------------------------------------------------------------------

/// A layer with trainable parameters.
#[derive(Debug, Clone)]
pub enum Layer {
    /// See [`Conv1d`].
    Conv1d(Conv1d),
    /// See [`Dense`].
    Dense(Dense),
}

impl Layer {
    /// Number of trainable scalars.
    pub fn num_parameters(&self) -> usize {
        match self {
            Layer::Conv1d(c) => c.weight.len() + c.bias.len(),
            Layer::Dense(d) => d.weight.len() + d.bias.len(),
        }
    }

    /// Reset the accumulated gradients to zero.
    pub fn zero_grad(&mut self) {
        match self {
            Layer::Conv1d(c) => {
                c.grad_weight.fill(0.0);
                c.grad_bias.fill(0.0);
            }
            Layer::Dense(d) => {
                d.grad_weight.fill(0.0);
                d.grad_bias.fill(0.0);
            }
        }
    }

    /// `(parameter, gradient)` slice pairs, weight first then bias.
    ///
    /// Returns `None` if a buffer is not contiguous, which never happens for
    /// layers built by this crate.
    pub fn param_slices(&mut self) -> Option<[(&mut [f32], &[f32]); 2]> {
        match self {
            Layer::Conv1d(c) => Some([
                (c.weight.as_slice_mut()?, c.grad_weight.as_slice()?),
                (c.bias.as_slice_mut()?, c.grad_bias.as_slice()?),
            ]),
            Layer::Dense(d) => Some([
                (d.weight.as_slice_mut()?, d.grad_weight.as_slice()?),
                (d.bias.as_slice_mut()?, d.grad_bias.as_slice()?),
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
