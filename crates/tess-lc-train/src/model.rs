//! Executable autoencoder.
//!
//! [`Model::new`] is the single interpreter that lowers a [`Blueprint`] into
//! a [`Graph`] plus a table of trainable [`Layer`]s. The model then exposes
//! plain `ndarray` outputs: reconstructions or class probabilities
//! ([`Model::predict`]), latent vectors ([`Model::encode`]) and every node's
//! activation ([`Model::layer_outputs`]).
//!
//! Node names follow `<block>/<kind>_<index>`, e.g. `encoder/conv1d_0`,
//! `decoder_1/upsample_6`, `side/dense_2`.

use std::collections::HashMap;

use ndarray::{concatenate, s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::architecture::{
    BuildOptions, Blueprint, DenseStage, Head, PoolStage, Stage, StageShape,
};
use crate::config::{ArchitectureConfig, LossKind};
use crate::error::{TrainError, TrainResult};
use crate::graph::{ConcatAxis, Graph, InputSlot, Inputs, LayerId, NodeId, Op};
use crate::layers::{Conv1d, Dense, Layer};
use crate::losses;
use crate::optimizer::ParamOptimizers;

/// Objects per forward pass in [`Model::predict`] and [`Model::encode`].
pub const INFERENCE_CHUNK: usize = 256;

/// Activation of one graph node for a batch.
#[derive(Debug, Clone)]
pub struct LayerOutput {
    /// Node name.
    pub name: String,
    /// `[B, T, C]` activation.
    pub output: Array3<f32>,
}

/// Result of one optimisation step.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// Mean loss of the mini-batch, before the update.
    pub loss: f32,
    /// Network output for the mini-batch, before the update.
    pub prediction: Array3<f32>,
}

/// A lowered, trainable network.
#[derive(Debug, Clone)]
pub struct Model {
    blueprint: Blueprint,
    graph: Graph,
    shapes: Vec<StageShape>,
    layers: Vec<Layer>,
    output: NodeId,
    latent: NodeId,
    rng: StdRng,
}

/// Encoder layers keyed by `(stage index, fan-in)`. Segments whose shapes
/// agree at a stage reuse its weights.
type SharedLayers = HashMap<(usize, usize), LayerId>;

struct Lowering {
    graph: Graph,
    shapes: Vec<StageShape>,
    layers: Vec<Layer>,
    rng: StdRng,
}

impl Lowering {
    fn push(&mut self, name: String, op: Op, shape: StageShape) -> NodeId {
        self.shapes.push(shape);
        self.graph.push(name, op)
    }

    fn add_layer(&mut self, layer: Layer) -> LayerId {
        self.layers.push(layer);
        self.layers.len() - 1
    }

    fn dense(
        &mut self,
        name: String,
        input: NodeId,
        shape: StageShape,
        stage: DenseStage,
    ) -> TrainResult<NodeId> {
        let fan_in = dense_fan_in(shape)?;
        let layer = Dense::new(fan_in, stage.units, &mut self.rng);
        let layer = self.add_layer(Layer::Dense(layer));
        let op = Op::Dense {
            input,
            layer,
            activation: stage.activation,
        };
        Ok(self.push(name, op, (1, stage.units)))
    }

    /// Lower `stages` on top of `input`. With `shared`, weight-bearing
    /// stages look up (and register) their layer by stage index and fan-in.
    fn stages(
        &mut self,
        block: &str,
        stages: &[Stage],
        mut input: NodeId,
        mut shape: StageShape,
        mut shared: Option<&mut SharedLayers>,
    ) -> TrainResult<(NodeId, StageShape)> {
        for (i, stage) in stages.iter().enumerate() {
            let name = format!("{block}/{}_{i}", stage.kind());
            let out_shape = stage.output_shape(shape);
            let op = match *stage {
                Stage::Conv(conv) => {
                    let key = (i, shape.1);
                    let existing = shared.as_deref().and_then(|m| m.get(&key).copied());
                    let layer = match existing {
                        Some(id) => id,
                        None => {
                            let layer = Conv1d::new(
                                conv.kernel_size,
                                shape.1,
                                conv.filters,
                                &mut self.rng,
                            );
                            let id = self.add_layer(Layer::Conv1d(layer));
                            if let Some(map) = shared.as_deref_mut() {
                                map.insert(key, id);
                            }
                            id
                        }
                    };
                    Op::Conv { input, layer, activation: conv.activation }
                }
                Stage::Dense(dense) => {
                    let fan_in = dense_fan_in(shape)?;
                    let key = (i, fan_in);
                    let existing = shared.as_deref().and_then(|m| m.get(&key).copied());
                    let layer = match existing {
                        Some(id) => id,
                        None => {
                            let layer = Dense::new(fan_in, dense.units, &mut self.rng);
                            let id = self.add_layer(Layer::Dense(layer));
                            if let Some(map) = shared.as_deref_mut() {
                                map.insert(key, id);
                            }
                            id
                        }
                    };
                    Op::Dense { input, layer, activation: dense.activation }
                }
                Stage::Pool(PoolStage::Time { factor }) => Op::PoolTime { input, factor },
                Stage::Pool(PoolStage::Channels) => Op::PoolChannels { input },
                Stage::Dropout(d) => Op::Dropout { input, rate: d.rate },
                Stage::Flatten => Op::Flatten { input },
                Stage::Reshape => Op::Reshape { input },
                Stage::Broadcast { channels } => Op::Broadcast { input, channels },
                Stage::Upsample { factor } => Op::Upsample { input, factor },
            };
            input = self.push(name, op, out_shape);
            shape = out_shape;
        }
        Ok((input, shape))
    }
}

fn dense_fan_in(shape: StageShape) -> TrainResult<usize> {
    if shape.0 != 1 {
        return Err(TrainError::shape_mismatch(vec![1, shape.1], vec![shape.0, shape.1]));
    }
    Ok(shape.1)
}

fn block_name(base: &str, index: usize, count: usize) -> String {
    if count == 1 {
        base.to_string()
    } else {
        format!("{base}_{index}")
    }
}

impl Model {
    /// Lower `blueprint` with weights drawn from a generator seeded by `seed`.
    /// The same generator later drives dropout masks.
    pub fn new(blueprint: Blueprint, seed: u64) -> TrainResult<Self> {
        let mut low = Lowering {
            graph: Graph::default(),
            shapes: Vec::new(),
            layers: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        };

        let flux = low.push(
            "input/flux".into(),
            Op::Input(InputSlot::Flux),
            (blueprint.input_len, 1),
        );

        // Encoder, once per segment.
        let n_seg = blueprint.segments.len();
        let mut shared = SharedLayers::new();
        let mut branch_latents = Vec::with_capacity(n_seg);
        for (n, seg) in blueprint.segments.iter().enumerate() {
            let block = block_name("encoder", n, n_seg);
            let input = if n_seg == 1 {
                flux
            } else {
                low.push(
                    format!("{block}/slice"),
                    Op::SliceTime { input: flux, start: seg.start, end: seg.end },
                    (seg.len(), 1),
                )
            };
            let encoded = low.stages(
                &block,
                &blueprint.encoder,
                input,
                (seg.len(), 1),
                Some(&mut shared),
            )?;
            branch_latents.push(encoded);
        }

        let (mut latent, mut latent_shape) = match (
            &blueprint.bottleneck,
            branch_latents.as_slice(),
        ) {
            (Some(stage), parts) if parts.len() > 1 => {
                let width = parts.iter().map(|(_, s)| s.1).sum();
                let cat = low.push(
                    "bottleneck/concat".into(),
                    Op::Concat {
                        inputs: parts.iter().map(|(id, _)| *id).collect(),
                        axis: ConcatAxis::Features,
                    },
                    (1, width),
                );
                let id = low.dense("bottleneck/dense".into(), cat, (1, width), *stage)?;
                (id, (1, stage.units))
            }
            (_, [only]) => *only,
            _ => {
                return Err(TrainError::training_step(
                    "blueprint has several segments but no bottleneck",
                ));
            }
        };

        if let Some(side) = &blueprint.side {
            let input = low.push(
                "input/side".into(),
                Op::Input(InputSlot::Side),
                (1, side.input_dim),
            );
            let mut node = input;
            let mut shape = (1, side.input_dim);
            for (i, stage) in side.stages.iter().enumerate() {
                node = low.dense(format!("side/dense_{i}"), node, shape, *stage)?;
                shape = (1, stage.units);
            }
            let width = shape.1 + latent_shape.1;
            let cat = low.push(
                "fusion/concat".into(),
                Op::Concat { inputs: vec![node, latent], axis: ConcatAxis::Features },
                (1, width),
            );
            latent = low.dense("fusion/dense".into(), cat, (1, width), side.fusion)?;
            latent_shape = (1, side.fusion.units);
        }

        let output = match &blueprint.head {
            Head::Classifier(stage) => {
                low.dense("classifier/dense".into(), latent, latent_shape, *stage)?
            }
            Head::Decoder(branches) => {
                let mut outs = Vec::with_capacity(branches.len());
                let mut total = 0;
                for (n, stages) in branches.iter().enumerate() {
                    let block = block_name("decoder", n, branches.len());
                    let (id, shape) = low.stages(&block, stages, latent, latent_shape, None)?;
                    total += shape.0;
                    outs.push(id);
                }
                match outs.as_slice() {
                    [only] => *only,
                    _ => low.push(
                        "decoder/concat".into(),
                        Op::Concat { inputs: outs, axis: ConcatAxis::Time },
                        (total, 1),
                    ),
                }
            }
        };

        let model = Model {
            blueprint,
            graph: low.graph,
            shapes: low.shapes,
            layers: low.layers,
            output,
            latent,
            rng: low.rng,
        };
        info!(
            nodes = model.graph.len(),
            layers = model.layers.len(),
            parameters = model.num_parameters(),
            "model lowered"
        );
        Ok(model)
    }

    /// Build the blueprint for `input_len` and lower it, seeding from
    /// `config.seed`.
    pub fn build(
        config: &ArchitectureConfig,
        input_len: usize,
        options: BuildOptions,
    ) -> TrainResult<Self> {
        let blueprint = Blueprint::build(config, input_len, options)?;
        Model::new(blueprint, config.seed)
    }

    /// The blueprint this model was lowered from.
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// The lowered graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Trainable layers, in creation order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Width of the latent vector.
    pub fn latent_dim(&self) -> usize {
        self.shapes[self.latent].1
    }

    /// Number of trainable scalars. Shared layers count once.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(Layer::num_parameters).sum()
    }

    /// One line per node: name, output shape and parameter count.
    pub fn summary(&self) -> String {
        let mut seen = vec![false; self.layers.len()];
        let mut out = String::new();
        for (node, shape) in self.graph.nodes.iter().zip(&self.shapes) {
            let params = match node.op {
                Op::Conv { layer, .. } | Op::Dense { layer, .. } if !seen[layer] => {
                    seen[layer] = true;
                    self.layers[layer].num_parameters()
                }
                _ => 0,
            };
            out.push_str(&format!(
                "{:<32} ({:>6}, {:>4})  {params}\n",
                node.name, shape.0, shape.1
            ));
        }
        out.push_str(&format!("total parameters: {}\n", self.num_parameters()));
        out
    }

    /// Reconstruction target for `x`: the input segments joined along
    /// time. Equal to `x` unless the model is split around an orbit gap.
    pub fn target_for(&self, x: ArrayView3<'_, f32>) -> TrainResult<Array3<f32>> {
        self.check_flux(&x)?;
        match self.blueprint.segments.as_slice() {
            [only] if only.start == 0 && only.end == self.blueprint.input_len => Ok(x.to_owned()),
            segments => {
                let views: Vec<_> = segments
                    .iter()
                    .map(|seg| x.slice(s![.., seg.start..seg.end, ..]))
                    .collect();
                concatenate(Axis(1), &views).map_err(|e| TrainError::training_step(e.to_string()))
            }
        }
    }

    /// Network output at inference: `[B, output_len, 1]` reconstructions or
    /// `[B, 1, classes]` probabilities.
    pub fn predict(
        &self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
    ) -> TrainResult<Array3<f32>> {
        self.infer_node(x, side, self.output)
    }

    /// Latent vectors, `[B, latent_dim]`.
    pub fn encode(
        &self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
    ) -> TrainResult<Array2<f32>> {
        let z = self.infer_node(x, side, self.latent)?;
        Ok(z.index_axis_move(Axis(1), 0))
    }

    /// Every node's activation for one batch, in graph order.
    pub fn layer_outputs(
        &self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
    ) -> TrainResult<Vec<LayerOutput>> {
        self.check_inputs(&x, side.as_ref())?;
        let inputs = Inputs {
            flux: x,
            side: side.map(|s| s.insert_axis(Axis(1))),
        };
        let trace = self.graph.forward::<StdRng>(&self.layers, inputs, None)?;
        Ok(self
            .graph
            .nodes
            .iter()
            .zip(trace.into_outputs())
            .map(|(node, output)| LayerOutput { name: node.name.clone(), output })
            .collect())
    }

    /// Mean loss of the inference output against `target`.
    pub fn evaluate(
        &self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
        target: &Array3<f32>,
        loss: LossKind,
    ) -> TrainResult<f32> {
        let pred = self.predict(x, side)?;
        losses::loss(loss, &pred, target)
    }

    /// Forward with dropout, back-propagate `loss` and apply one optimiser
    /// update. A non-finite loss is returned without touching the weights.
    pub fn train_step(
        &mut self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
        target: &Array3<f32>,
        loss: LossKind,
        optimizers: &mut ParamOptimizers,
    ) -> TrainResult<StepOutput> {
        self.check_inputs(&x, side.as_ref())?;
        for layer in &mut self.layers {
            layer.zero_grad();
        }
        let inputs = Inputs {
            flux: x,
            side: side.map(|s| s.insert_axis(Axis(1))),
        };
        let trace = self.graph.forward(&self.layers, inputs, Some(&mut self.rng))?;
        let prediction = trace.output(self.output).clone();
        let (value, grad) = losses::loss_and_grad(loss, &prediction, target)?;
        if !value.is_finite() {
            return Ok(StepOutput { loss: value, prediction });
        }
        self.graph.backward(&mut self.layers, &trace, self.output, grad)?;
        optimizers.step(&mut self.layers)?;
        Ok(StepOutput { loss: value, prediction })
    }

    /// Fresh per-tensor optimisers for this model's layers.
    pub fn optimizers(&mut self, config: &ArchitectureConfig) -> TrainResult<ParamOptimizers> {
        ParamOptimizers::new(config, &mut self.layers)
    }

    fn infer_node(
        &self,
        x: ArrayView3<'_, f32>,
        side: Option<ArrayView2<'_, f32>>,
        node: NodeId,
    ) -> TrainResult<Array3<f32>> {
        self.check_inputs(&x, side.as_ref())?;
        let n = x.len_of(Axis(0));
        let (t, c) = self.shapes[node];
        if n == 0 {
            return Ok(Array3::zeros((0, t, c)));
        }
        let mut parts = Vec::with_capacity((n + INFERENCE_CHUNK - 1) / INFERENCE_CHUNK);
        for start in (0..n).step_by(INFERENCE_CHUNK) {
            let end = (start + INFERENCE_CHUNK).min(n);
            let inputs = Inputs {
                flux: x.slice(s![start..end, .., ..]),
                side: side.as_ref().map(|s| s.slice(s![start..end, ..]).insert_axis(Axis(1))),
            };
            let trace = self.graph.forward::<StdRng>(&self.layers, inputs, None)?;
            parts.push(trace.into_outputs().swap_remove(node));
        }
        debug!(objects = n, chunks = parts.len(), "inference");
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).map_err(|e| TrainError::training_step(e.to_string()))
    }

    fn check_flux(&self, x: &ArrayView3<'_, f32>) -> TrainResult<()> {
        let (b, t, c) = x.dim();
        if t != self.blueprint.input_len || c != 1 {
            return Err(TrainError::shape_mismatch(
                vec![b, self.blueprint.input_len, 1],
                vec![b, t, c],
            ));
        }
        Ok(())
    }

    fn check_inputs(
        &self,
        x: &ArrayView3<'_, f32>,
        side: Option<&ArrayView2<'_, f32>>,
    ) -> TrainResult<()> {
        self.check_flux(x)?;
        match (&self.blueprint.side, side) {
            (Some(spec), Some(s)) => {
                let expected = vec![x.len_of(Axis(0)), spec.input_dim];
                if s.shape() != expected.as_slice() {
                    return Err(TrainError::shape_mismatch(expected, s.shape().to_vec()));
                }
                Ok(())
            }
            (Some(_), None) => Err(TrainError::MissingInput("side features")),
            (None, Some(_)) => Err(TrainError::MissingInput("model has no side channel")),
            (None, None) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
