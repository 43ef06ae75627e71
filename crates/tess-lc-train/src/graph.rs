//! Owned computation graph with reverse-mode gradients.
//!
//! Nodes are stored in creation order, which is a topological order: a node
//! only ever references nodes created before it. The forward pass fills a
//! [`Trace`] with every node's output; the backward pass walks the nodes in
//! reverse and accumulates gradients into the [`Layer`]s. A layer referenced
//! by several nodes (split-mode encoder) receives the sum of their
//! gradients.

use ndarray::{concatenate, s, Array2, Array3, ArrayView3, Axis};
use rand::Rng;

use crate::config::Activation;
use crate::error::{TrainError, TrainResult};
use crate::layers::Layer;

/// Index of a node in [`Graph::nodes`].
pub type NodeId = usize;

/// Index of a layer in the model's layer table.
pub type LayerId = usize;

/// Which model input a node reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    /// Flux tensor, `[B, L, 1]`.
    Flux,
    /// Side-channel features, `[B, 1, d]`.
    Side,
}

/// Axis along which [`Op::Concat`] joins its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatAxis {
    /// Axis 1.
    Time,
    /// Axis 2.
    Features,
}

impl ConcatAxis {
    fn axis(self) -> Axis {
        match self {
            ConcatAxis::Time => Axis(1),
            ConcatAxis::Features => Axis(2),
        }
    }
}

/// Graph operation. `input`/`inputs` fields name upstream nodes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Model input.
    Input(InputSlot),
    /// `x[:, start..end, :]`
    SliceTime { input: NodeId, start: usize, end: usize },
    /// Convolution followed by an activation.
    Conv { input: NodeId, layer: LayerId, activation: Activation },
    /// Dense projection followed by an activation.
    Dense { input: NodeId, layer: LayerId, activation: Activation },
    /// Max over groups of `factor` time steps; the last group may be short.
    PoolTime { input: NodeId, factor: usize },
    /// Max over channels, leaving one channel.
    PoolChannels { input: NodeId },
    /// Per-sample channel dropout, inverted scaling.
    Dropout { input: NodeId, rate: f32 },
    /// `[B, T, C]` → `[B, 1, T·C]`
    Flatten { input: NodeId },
    /// `[B, 1, n]` → `[B, n, 1]`
    Reshape { input: NodeId },
    /// `[B, T, 1]` → `[B, T, channels]`
    Broadcast { input: NodeId, channels: usize },
    /// Nearest-neighbour repetition along time.
    Upsample { input: NodeId, factor: usize },
    /// Concatenation.
    Concat { inputs: Vec<NodeId>, axis: ConcatAxis },
}

/// A named operation.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique, human-readable name.
    pub name: String,
    /// The operation.
    pub op: Op,
}

/// Per-node data the backward pass needs besides the outputs.
#[derive(Debug, Clone)]
enum Cache {
    Empty,
    /// Source index (time or channel) of every pooled value.
    Argmax(Array3<usize>),
    /// `[B, C]` dropout multipliers.
    Mask(Array2<f32>),
}

/// Forward-pass record.
#[derive(Debug, Clone)]
pub struct Trace {
    outputs: Vec<Array3<f32>>,
    caches: Vec<Cache>,
}

impl Trace {
    /// Output of `node`.
    pub fn output(&self, node: NodeId) -> &Array3<f32> {
        &self.outputs[node]
    }

    /// Consume the trace, keeping every node output.
    pub fn into_outputs(self) -> Vec<Array3<f32>> {
        self.outputs
    }
}

/// Model inputs for one forward pass.
///
/// The two views carry separate lifetimes; `ArrayView` is invariant in its
/// lifetime, so callers may borrow them from unrelated owners.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'f, 's> {
    /// `[B, L, 1]`
    pub flux: ArrayView3<'f, f32>,
    /// `[B, 1, d]`, when the model has a side channel.
    pub side: Option<ArrayView3<'s, f32>>,
}

/// Directed acyclic graph of [`Node`]s.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Nodes in topological order.
    pub nodes: Vec<Node>,
}

impl Graph {
    /// Append a node and return its id.
    pub fn push(&mut self, name: impl Into<String>, op: Op) -> NodeId {
        self.nodes.push(Node { name: name.into(), op });
        self.nodes.len() - 1
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Evaluate every node. Dropout is active iff `rng` is given.
    pub fn forward<R: Rng + ?Sized>(
        &self,
        layers: &[Layer],
        inputs: Inputs<'_, '_>,
        mut rng: Option<&mut R>,
    ) -> TrainResult<Trace> {
        let mut outputs: Vec<Array3<f32>> = Vec::with_capacity(self.nodes.len());
        let mut caches = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let (out, cache) = match &node.op {
                Op::Input(InputSlot::Flux) => (inputs.flux.to_owned(), Cache::Empty),
                Op::Input(InputSlot::Side) => {
                    let side = inputs.side.ok_or(TrainError::MissingInput("side features"))?;
                    (side.to_owned(), Cache::Empty)
                }
                Op::SliceTime { input, start, end } => {
                    (outputs[*input].slice(s![.., *start..*end, ..]).to_owned(), Cache::Empty)
                }
                Op::Conv { input, layer, activation } => {
                    let Layer::Conv1d(conv) = &layers[*layer] else {
                        return Err(layer_kind_error(&node.name));
                    };
                    let mut y = conv.forward(outputs[*input].view());
                    activation.forward_inplace(&mut y);
                    (y, Cache::Empty)
                }
                Op::Dense { input, layer, activation } => {
                    let Layer::Dense(dense) = &layers[*layer] else {
                        return Err(layer_kind_error(&node.name));
                    };
                    let mut y = dense.forward(outputs[*input].view());
                    activation.forward_inplace(&mut y);
                    (y, Cache::Empty)
                }
                Op::PoolTime { input, factor } => {
                    let (y, arg) = pool_time(&outputs[*input], *factor);
                    (y, Cache::Argmax(arg))
                }
                Op::PoolChannels { input } => {
                    let (y, arg) = pool_channels(&outputs[*input]);
                    (y, Cache::Argmax(arg))
                }
                Op::Dropout { input, rate } => {
                    let x = &outputs[*input];
                    match rng.as_deref_mut() {
                        Some(rng) if *rate > 0.0 => {
                            let (b, _, c) = x.dim();
                            let keep = 1.0 / (1.0 - rate);
                            let mask = Array2::from_shape_simple_fn((b, c), || {
                                if rng.gen::<f32>() < *rate { 0.0 } else { keep }
                            });
                            let y = x * &mask.view().insert_axis(Axis(1));
                            (y, Cache::Mask(mask))
                        }
                        _ => (x.clone(), Cache::Empty),
                    }
                }
                Op::Flatten { input } => {
                    let x = &outputs[*input];
                    let (b, t, c) = x.dim();
                    (reshape(x, (b, 1, t * c))?, Cache::Empty)
                }
                Op::Reshape { input } => {
                    let x = &outputs[*input];
                    let (b, t, c) = x.dim();
                    (reshape(x, (b, t * c, 1))?, Cache::Empty)
                }
                Op::Broadcast { input, channels } => {
                    let x = &outputs[*input];
                    let (b, t, _) = x.dim();
                    let y = x
                        .broadcast((b, t, *channels))
                        .ok_or_else(|| {
                            TrainError::shape_mismatch(vec![b, t, 1], x.shape().to_vec())
                        })?
                        .to_owned();
                    (y, Cache::Empty)
                }
                Op::Upsample { input, factor } => {
                    let x = &outputs[*input];
                    let (b, t, c) = x.dim();
                    let y = Array3::from_shape_fn((b, t * factor, c), |(i, j, k)| {
                        x[[i, j / factor, k]]
                    });
                    (y, Cache::Empty)
                }
                Op::Concat { inputs: parts, axis } => {
                    let views: Vec<_> = parts.iter().map(|&p| outputs[p].view()).collect();
                    let y = concatenate(axis.axis(), &views)
                        .map_err(|e| TrainError::training_step(format!("{}: {e}", node.name)))?;
                    (y, Cache::Empty)
                }
            };
            outputs.push(out);
            caches.push(cache);
        }
        Ok(Trace { outputs, caches })
    }

    /// Back-propagate `dout` (gradient w.r.t. the output of `output`) and
    /// accumulate parameter gradients into `layers`.
    pub fn backward(
        &self,
        layers: &mut [Layer],
        trace: &Trace,
        output: NodeId,
        dout: Array3<f32>,
    ) -> TrainResult<()> {
        let mut grads: Vec<Option<Array3<f32>>> = vec![None; self.nodes.len()];
        grads[output] = Some(dout);

        for id in (0..=output).rev() {
            let Some(g) = grads[id].take() else { continue };
            let node = &self.nodes[id];
            match &node.op {
                Op::Input(_) => {}
                Op::SliceTime { input, start, end } => {
                    let mut dx = Array3::zeros(trace.outputs[*input].raw_dim());
                    dx.slice_mut(s![.., *start..*end, ..]).assign(&g);
                    accumulate(&mut grads, *input, dx);
                }
                Op::Conv { input, layer, activation } => {
                    let dpre = activation.backward(&trace.outputs[id], &g);
                    let Layer::Conv1d(conv) = &mut layers[*layer] else {
                        return Err(layer_kind_error(&node.name));
                    };
                    let dx = conv.backward(trace.outputs[*input].view(), &dpre);
                    accumulate(&mut grads, *input, dx);
                }
                Op::Dense { input, layer, activation } => {
                    let dpre = activation.backward(&trace.outputs[id], &g);
                    let Layer::Dense(dense) = &mut layers[*layer] else {
                        return Err(layer_kind_error(&node.name));
                    };
                    let dx = dense.backward(trace.outputs[*input].view(), &dpre);
                    accumulate(&mut grads, *input, dx);
                }
                Op::PoolTime { input, .. } => {
                    let Cache::Argmax(arg) = &trace.caches[id] else {
                        return Err(cache_error(&node.name));
                    };
                    let mut dx = Array3::zeros(trace.outputs[*input].raw_dim());
                    for ((b, t, c), &src) in arg.indexed_iter() {
                        dx[[b, src, c]] += g[[b, t, c]];
                    }
                    accumulate(&mut grads, *input, dx);
                }
                Op::PoolChannels { input } => {
                    let Cache::Argmax(arg) = &trace.caches[id] else {
                        return Err(cache_error(&node.name));
                    };
                    let mut dx = Array3::zeros(trace.outputs[*input].raw_dim());
                    for ((b, t, _), &src) in arg.indexed_iter() {
                        dx[[b, t, src]] += g[[b, t, 0]];
                    }
                    accumulate(&mut grads, *input, dx);
                }
                Op::Dropout { input, .. } => {
                    let dx = match &trace.caches[id] {
                        Cache::Mask(mask) => g * &mask.view().insert_axis(Axis(1)),
                        _ => g,
                    };
                    accumulate(&mut grads, *input, dx);
                }
                Op::Flatten { input } | Op::Reshape { input } => {
                    let shape = trace.outputs[*input].dim();
                    accumulate(&mut grads, *input, reshape(&g, shape)?);
                }
                Op::Broadcast { input, .. } => {
                    let dx = g.sum_axis(Axis(2)).insert_axis(Axis(2));
                    accumulate(&mut grads, *input, dx);
                }
                Op::Upsample { input, factor } => {
                    let (b, t, c) = trace.outputs[*input].dim();
                    let mut dx = Array3::zeros((b, t, c));
                    for ((i, j, k), &v) in g.indexed_iter() {
                        dx[[i, j / factor, k]] += v;
                    }
                    accumulate(&mut grads, *input, dx);
                }
                Op::Concat { inputs: parts, axis } => {
                    let ax = axis.axis();
                    let mut offset = 0;
                    for &p in parts {
                        let width = trace.outputs[p].len_of(ax);
                        let dx = g.slice_axis(ax, (offset..offset + width).into()).to_owned();
                        offset += width;
                        accumulate(&mut grads, p, dx);
                    }
                }
            }
        }
        Ok(())
    }
}

fn accumulate(grads: &mut [Option<Array3<f32>>], node: NodeId, g: Array3<f32>) {
    match &mut grads[node] {
        Some(existing) => *existing += &g,
        slot @ None => *slot = Some(g),
    }
}

fn reshape(x: &Array3<f32>, shape: (usize, usize, usize)) -> TrainResult<Array3<f32>> {
    let actual = x.shape().to_vec();
    let flat: Vec<f32> = x.iter().copied().collect();
    Array3::from_shape_vec(shape, flat)
        .map_err(|_| TrainError::shape_mismatch(vec![shape.0, shape.1, shape.2], actual))
}

fn layer_kind_error(node: &str) -> TrainError {
    TrainError::training_step(format!("node `{node}` references a layer of the wrong kind"))
}

fn cache_error(node: &str) -> TrainError {
    TrainError::training_step(format!("node `{node}` has no forward cache"))
}

fn pool_time(x: &Array3<f32>, factor: usize) -> (Array3<f32>, Array3<usize>) {
    let (b, t, c) = x.dim();
    let out_t = (t + factor - 1) / factor;
    let mut y = Array3::zeros((b, out_t, c));
    let mut arg = Array3::zeros((b, out_t, c));
    for i in 0..b {
        for j in 0..out_t {
            let lo = j * factor;
            let hi = (lo + factor).min(t);
            for k in 0..c {
                let mut best = lo;
                for src in lo + 1..hi {
                    if x[[i, src, k]] > x[[i, best, k]] {
                        best = src;
                    }
                }
                y[[i, j, k]] = x[[i, best, k]];
                arg[[i, j, k]] = best;
            }
        }
    }
    (y, arg)
}

fn pool_channels(x: &Array3<f32>) -> (Array3<f32>, Array3<usize>) {
    let (b, t, c) = x.dim();
    let mut y = Array3::zeros((b, t, 1));
    let mut arg = Array3::zeros((b, t, 1));
    for i in 0..b {
        for j in 0..t {
            let mut best = 0;
            for k in 1..c {
                if x[[i, j, k]] > x[[i, j, best]] {
                    best = k;
                }
            }
            y[[i, j, 0]] = x[[i, j, best]];
            arg[[i, j, 0]] = best;
        }
    }
    (y, arg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
