//! Architecture builder.
//!
//! [`Blueprint::build`] turns a validated [`ArchitectureConfig`] plus the
//! concrete input shape into an explicit list of typed [`Stage`]
//! descriptors. Nothing here allocates weights; [`crate::model::Model`]
//! lowers a blueprint into an executable graph.
//!
//! ```text
//!  conv variant, S = num_conv_layers / 2 stages
//!
//!  flux [L × 1]
//!    │  for i in 0..S:  Conv(f[i], k[i]) → Pool(time ×2) → Dropout → Pool(channels)
//!    │  Flatten → Dense(latent)                                 ← bottleneck
//!    │  Dense(L / 2^S) → Reshape
//!    │  for i in 0..S:  Broadcast(f[S+i]) → Dropout → Upsample ×2 → Conv(1, k[S+i])
//!    ▼
//!  reconstruction [L × 1]
//! ```
//!
//! The split variant runs the encoder list on both segments (weights shared
//! wherever the shapes agree), concatenates the two latent vectors and
//! projects them through one more dense layer. The decoder list is
//! instantiated once per segment and the branch outputs are concatenated
//! along time.

use serde::{Deserialize, Serialize};

use crate::config::{Activation, ArchitectureConfig, Variant};
use crate::error::{ArchitectureError, ConfigError, TrainResult};

// ---------------------------------------------------------------------------
// Stage descriptors
// ---------------------------------------------------------------------------

/// Same-padded 1-D convolution over the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvStage {
    /// Output channels.
    pub filters: usize,
    /// Kernel width.
    pub kernel_size: usize,
    /// Nonlinearity.
    pub activation: Activation,
}

/// Max-reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStage {
    /// Over adjacent groups of `factor` time steps, same padding.
    Time {
        /// Pool width and stride.
        factor: usize,
    },
    /// Over every channel, collapsing the channel axis to 1.
    Channels,
}

/// Channel dropout; identity at inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropoutStage {
    /// Fraction of channels zeroed per sample.
    pub rate: f32,
}

/// Fully-connected projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseStage {
    /// Output units.
    pub units: usize,
    /// Nonlinearity.
    pub activation: Activation,
}

/// One step of a stage list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// See [`ConvStage`].
    Conv(ConvStage),
    /// See [`PoolStage`].
    Pool(PoolStage),
    /// See [`DropoutStage`].
    Dropout(DropoutStage),
    /// See [`DenseStage`].
    Dense(DenseStage),
    /// `[T × C]` → `[1 × T·C]`.
    Flatten,
    /// `[1 × n]` → `[n × 1]`.
    Reshape,
    /// Replicate the single channel `channels` times.
    Broadcast {
        /// Target channel count.
        channels: usize,
    },
    /// Nearest-neighbour repetition along time.
    Upsample {
        /// Repetition factor.
        factor: usize,
    },
}

/// Shape of an activation as seen by the stage that consumes it:
/// `(time, channels)`. Dense-level activations are `(1, units)`.
pub type StageShape = (usize, usize);

impl Stage {
    /// Output shape of this stage for an input of shape `input`.
    pub fn output_shape(&self, input: StageShape) -> StageShape {
        let (t, c) = input;
        match *self {
            Stage::Conv(conv) => (t, conv.filters),
            Stage::Pool(PoolStage::Time { factor }) => ((t + factor - 1) / factor.max(1), c),
            Stage::Pool(PoolStage::Channels) => (t, 1),
            Stage::Dropout(_) => (t, c),
            Stage::Dense(dense) => (1, dense.units),
            Stage::Flatten => (1, t * c),
            Stage::Reshape => (t * c, 1),
            Stage::Broadcast { channels } => (t, channels),
            Stage::Upsample { factor } => (t * factor, c),
        }
    }

    /// Short name used for graph nodes.
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::Conv(_) => "conv1d",
            Stage::Pool(PoolStage::Time { .. }) => "max_pool_time",
            Stage::Pool(PoolStage::Channels) => "max_pool_channels",
            Stage::Dropout(_) => "dropout",
            Stage::Dense(_) => "dense",
            Stage::Flatten => "flatten",
            Stage::Reshape => "reshape",
            Stage::Broadcast { .. } => "broadcast",
            Stage::Upsample { .. } => "upsample",
        }
    }

    /// `true` for stages that own trainable weights.
    pub fn has_weights(&self) -> bool {
        matches!(self, Stage::Conv(_) | Stage::Dense(_))
    }
}

/// Propagate `input` through `stages`.
pub fn output_shape(stages: &[Stage], input: StageShape) -> StageShape {
    stages.iter().fold(input, |shape, stage| stage.output_shape(shape))
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// Half-open range of time indices fed to one encoder branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First index.
    pub start: usize,
    /// One past the last index.
    pub end: usize,
}

impl Segment {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// `true` when the segment holds no samples.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Dense network over per-object scalar features, fused with the bottleneck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideChannel {
    /// Number of scalar features per object.
    pub input_dim: usize,
    /// MLP stages, `input_dim → 8 → 4 → 1`.
    pub stages: Vec<DenseStage>,
    /// Projection of `[mlp output ‖ bottleneck]` back to `latent_dim`.
    pub fusion: DenseStage,
}

/// What sits after the latent vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Head {
    /// Reconstruction; one stage list per input segment, each with its own
    /// weights. Branch outputs are concatenated along time.
    Decoder(Vec<Vec<Stage>>),
    /// Softmax classification.
    Classifier(DenseStage),
}

/// Extra inputs that shape the blueprint beyond the config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Width of the numeric side channel, if one is attached.
    pub side_features: Option<usize>,
    /// Replace the decoder by a softmax head over this many classes.
    pub num_classes: Option<usize>,
}

/// Complete, input-specific description of a network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    /// Series length the network accepts.
    pub input_len: usize,
    /// Input segments, one per encoder branch.
    pub segments: Vec<Segment>,
    /// Encoder stages, applied to every segment. Ends in the latent dense.
    pub encoder: Vec<Stage>,
    /// Projection of the concatenated branch latents (split variant).
    pub bottleneck: Option<DenseStage>,
    /// Optional numeric side channel.
    pub side: Option<SideChannel>,
    /// Decoder or classifier.
    pub head: Head,
    /// Width of the latent vector.
    pub latent_dim: usize,
}

impl Blueprint {
    /// Build the blueprint for series of length `input_len`.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for an invalid config, and [`ArchitectureError`] when
    /// the config cannot be realised for `input_len` (a length not
    /// divisible by `2^S`, an orbit gap outside the series, a classifier
    /// with fewer than two classes).
    pub fn build(
        config: &ArchitectureConfig,
        input_len: usize,
        options: BuildOptions,
    ) -> TrainResult<Self> {
        config.validate()?;
        if input_len == 0 {
            return Err(ArchitectureError::EmptyStage { stage: "input".into() }.into());
        }
        if let Some(side) = options.side_features {
            if side == 0 {
                return Err(ConfigError::invalid_value("side_features", "must be > 0").into());
            }
        }

        let segments = match config.variant {
            Variant::Split { orbit_gap: [start, end] } => {
                if end >= input_len {
                    return Err(ArchitectureError::InvalidOrbitGap { start, end, input_len }.into());
                }
                vec![
                    Segment { start: 0, end: start },
                    Segment {
                        start: end,
                        end: input_len,
                    },
                ]
            }
            Variant::Conv | Variant::Simple => vec![Segment { start: 0, end: input_len }],
        };

        let convolutional = config.variant != Variant::Simple;
        let encoder = match config.variant {
            Variant::Simple => simple_encoder(config),
            Variant::Conv | Variant::Split { .. } => {
                let factor = config.downsample_factor();
                for (n, seg) in segments.iter().enumerate() {
                    if seg.is_empty() || seg.len() % factor != 0 {
                        let what = if segments.len() == 1 {
                            "input".to_string()
                        } else {
                            format!("segment {n}")
                        };
                        return Err(ArchitectureError::IndivisibleLength {
                            what,
                            length: seg.len(),
                            factor,
                            stages: config.num_stages(),
                        }
                        .into());
                    }
                }
                conv_encoder(config)
            }
        };

        let bottleneck = (segments.len() > 1).then_some(DenseStage {
            units: config.latent_dim,
            activation: config.activation,
        });

        let side = options.side_features.map(|input_dim| SideChannel {
            input_dim,
            stages: vec![
                DenseStage { units: 8, activation: Activation::Relu },
                DenseStage { units: 4, activation: Activation::Relu },
                DenseStage { units: 1, activation: Activation::Linear },
            ],
            fusion: DenseStage {
                units: config.latent_dim,
                activation: Activation::Relu,
            },
        });

        let head = match options.num_classes {
            Some(k) if k < 2 => return Err(ArchitectureError::TooFewClasses(k).into()),
            Some(k) => Head::Classifier(DenseStage { units: k, activation: Activation::Softmax }),
            None => Head::Decoder(
                segments
                    .iter()
                    .map(|seg| {
                        if convolutional {
                            conv_decoder(config, seg.len())
                        } else {
                            simple_decoder(config, seg.len())
                        }
                    })
                    .collect(),
            ),
        };

        let blueprint = Blueprint {
            input_len,
            segments,
            encoder,
            bottleneck,
            side,
            head,
            latent_dim: config.latent_dim,
        };
        blueprint.check_nonempty()?;
        Ok(blueprint)
    }

    /// Length of the reconstruction target: the sum of segment lengths.
    pub fn output_len(&self) -> usize {
        self.segments.iter().map(Segment::len).sum()
    }

    /// `true` for a classification head.
    pub fn is_classifier(&self) -> bool {
        matches!(self.head, Head::Classifier(_))
    }

    fn check_nonempty(&self) -> Result<(), ArchitectureError> {
        for seg in &self.segments {
            let mut shape = (seg.len(), 1);
            for stage in &self.encoder {
                shape = stage.output_shape(shape);
                if shape.0 == 0 || shape.1 == 0 {
                    return Err(ArchitectureError::EmptyStage { stage: format!("{stage:?}") });
                }
            }
        }
        Ok(())
    }
}

fn conv_encoder(config: &ArchitectureConfig) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(4 * config.num_stages() + 2);
    for i in 0..config.num_stages() {
        stages.push(Stage::Conv(ConvStage {
            filters: config.num_filters[i],
            kernel_size: config.kernel_size[i],
            activation: config.activation,
        }));
        stages.push(Stage::Pool(PoolStage::Time { factor: 2 }));
        stages.push(Stage::Dropout(DropoutStage { rate: config.dropout }));
        stages.push(Stage::Pool(PoolStage::Channels));
    }
    stages.push(Stage::Flatten);
    stages.push(Stage::Dense(DenseStage {
        units: config.latent_dim,
        activation: config.activation,
    }));
    stages
}

fn conv_decoder(config: &ArchitectureConfig, len: usize) -> Vec<Stage> {
    let s = config.num_stages();
    let mut stages = Vec::with_capacity(4 * s + 2);
    stages.push(Stage::Dense(DenseStage {
        units: len / config.downsample_factor(),
        activation: Activation::Linear,
    }));
    stages.push(Stage::Reshape);
    for i in 0..s {
        stages.push(Stage::Broadcast { channels: config.num_filters[s + i] });
        stages.push(Stage::Dropout(DropoutStage { rate: config.dropout }));
        stages.push(Stage::Upsample { factor: 2 });
        let activation = if i + 1 == s { config.last_activation } else { config.activation };
        stages.push(Stage::Conv(ConvStage {
            filters: 1,
            kernel_size: config.kernel_size[s + i],
            activation,
        }));
    }
    stages
}

fn simple_encoder(config: &ArchitectureConfig) -> Vec<Stage> {
    vec![
        Stage::Flatten,
        Stage::Dense(DenseStage {
            units: config.latent_dim,
            activation: config.activation,
        }),
    ]
}

fn simple_decoder(config: &ArchitectureConfig, len: usize) -> Vec<Stage> {
    vec![
        Stage::Dense(DenseStage {
            units: len,
            activation: config.last_activation,
        }),
        Stage::Reshape,
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
