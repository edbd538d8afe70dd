//! # Logic Machine
//!
//! A stack of [`LogicLayer`]s driven over depth. The machine owns every
//! layer, decides which layer serves each depth level, merges residual data
//! between levels, and applies the per-level connectivity masks.
//!
//! ## Residual modes
//!
//! - **Full**: every layer concatenates its own input in front of its output.
//! - **Output-only**: from level 1 on, the original inputs are merged back in
//!   after the previous level's output, and every level's output is
//!   accumulated into the final result.
//!
//! ## Recursion
//!
//! With weight sharing on, levels 0 to 2 each get a fresh layer. From level 3
//! on a level reuses the newest layer whose input channels match what the
//! level receives, so once the inert orders have settled every later level
//! runs layer 2 again. A fresh layer is built only when no existing one fits.
//!
//! The depth-to-layer plan is fixed at construction. Past the configured
//! depth it is extended without masks until the channel state repeats, which
//! closes a cycle and lets a forward pass run arbitrarily deep. If instead a
//! level is reached that no layer accepts, the plan stops there and deeper
//! forward passes are rejected.


use std::collections::HashMap;

use log::{debug, trace, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::MachineConfig;
use crate::error::{LogicError, Result};
use crate::group::{ChannelSpec, Group, GroupList};
use crate::layer::{LayerOptions, LogicLayer};

/// First depth level at which recursion may reuse an existing layer.
pub const RECURSION_START: usize = 3;

/// How earlier data flows into later depth levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidualMode {
    /// Each layer prepends its own input to its output.
    Full,
    /// Original inputs are re-merged at every level; outputs accumulate.
    OutputOnly,
}

impl ResidualMode {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(residual: bool, io_residual: bool) -> Result<Self> {
        match (residual, io_residual) {
            (true, false) => Ok(ResidualMode::Full),
            (false, true) => Ok(ResidualMode::OutputOnly),
            _ => Err(LogicError::ResidualConflict {
                residual,
                io_residual,
            }),
        }
    }
}

/// Layer stack with its depth schedule and channel bookkeeping.
#[derive(Debug)]
pub struct Machine {
    depth: usize,
    breadth: usize,
    residual_mode: ResidualMode,
    recursion: bool,
    connections: Option<Vec<Box<[bool]>>>,
    input_channels: Box<[usize]>,
    output_channels: Box<[usize]>,
    layers: Vec<LogicLayer>,
    /// Layer index per depth level, covering at least the configured depth.
    plan: Vec<usize>,
    /// First level of the repeating tail of `plan`, when it closes a cycle.
    cycle_start: Option<usize>,
}

impl Machine {
    /// Validates the configuration and builds every layer.
    ///
    /// Layer weights are drawn from a `ChaCha8Rng` seeded with `config.seed`,
    /// so equal configurations build identical machines.
    pub fn new(config: &MachineConfig) -> Result<Self> {
        let depth = config.depth;
        let breadth = config.breadth;
        if depth == 0 {
            return Err(LogicError::InvalidDepth(depth));
        }
        if breadth == 0 {
            return Err(LogicError::InvalidBreadth(breadth));
        }
        if config.hidden_dimension == 0 {
            return Err(LogicError::InvalidHidden(config.hidden_dimension));
        }
        let residual_mode = ResidualMode::from_flags(config.residual, config.io_residual)?;
        if config.recursion && residual_mode == ResidualMode::Full {
            return Err(LogicError::RecursionWithResidual);
        }

        let input_channels = config.input_channels.resolve(breadth)?;
        let requested_outputs = config.output_channels.resolve(breadth)?;
        let connections = config
            .connections
            .as_ref()
            .map(|masks| validate_connections(masks, depth, breadth))
            .transpose()?;

        let options = LayerOptions {
            hidden_dimension: config.hidden_dimension,
            exclude_self: config.exclude_self,
            residual: residual_mode == ResidualMode::Full,
        };
        let fresh_levels = if config.recursion {
            RECURSION_START
        } else {
            depth
        };

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut layers: Vec<LogicLayer> = Vec::with_capacity(depth);
        let mut plan = Vec::with_capacity(depth);
        let mut current = input_channels.clone();
        let mut accumulated = vec![0; breadth + 1];

        for level in 0..depth {
            // Output-only residual feeds the original inputs back in after level 0.
            if level > 0 && residual_mode == ResidualMode::OutputOnly {
                current = add_channels(&current, &input_channels);
            }

            let reused = if level >= fresh_levels {
                compatible_layer(&layers, &current)
            } else {
                None
            };
            let index = match reused {
                Some(index) => index,
                None => {
                    let layer = LogicLayer::new(
                        breadth,
                        &ChannelSpec::from(current.clone()),
                        &ChannelSpec::from(requested_outputs.clone()),
                        options,
                        &mut rng,
                    )?;
                    debug!(
                        "Built layer {} for level {}: channels {:?} -> {:?}",
                        layers.len(),
                        level,
                        layer.input_channels(),
                        layer.output_channels()
                    );
                    layers.push(layer);
                    layers.len() - 1
                }
            };
            plan.push(index);

            // Masked orders contribute nothing to the next level or the result.
            current = mask_channels(
                layers[index].output_channels(),
                connections.as_deref(),
                level,
            );
            if residual_mode == ResidualMode::OutputOnly {
                accumulated = add_channels(&accumulated, &current);
            }
        }

        let output_channels = match residual_mode {
            ResidualMode::OutputOnly => accumulated,
            ResidualMode::Full => current.clone(),
        };

        // Extend the plan past the configured depth. Those levels run unmasked
        // and never build layers; a repeated channel state closes the cycle.
        let mut cycle_start = None;
        if config.recursion {
            let mut seen: HashMap<Vec<usize>, usize> = HashMap::new();
            loop {
                let level = plan.len();
                current = add_channels(&current, &input_channels);
                if let Some(&start) = seen.get(&current) {
                    cycle_start = Some(start);
                    break;
                }
                let Some(index) = compatible_layer(&layers, &current) else {
                    debug!(
                        "No layer accepts channels {:?} at level {}; recursion stops there",
                        current, level
                    );
                    break;
                };
                seen.insert(current.clone(), level);
                plan.push(index);
                current = layers[index].output_channels().to_vec();
            }
        }

        debug!(
            "Machine ready: depth {}, breadth {}, {} distinct layers, plan {:?}, outputs {:?}",
            depth,
            breadth,
            layers.len(),
            plan,
            output_channels
        );

        Ok(Machine {
            depth,
            breadth,
            residual_mode,
            recursion: config.recursion,
            connections,
            input_channels: input_channels.into_boxed_slice(),
            output_channels: output_channels.into_boxed_slice(),
            layers,
            plan,
            cycle_start,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn breadth(&self) -> usize {
        self.breadth
    }

    pub fn residual_mode(&self) -> ResidualMode {
        self.residual_mode
    }

    pub fn recursion(&self) -> bool {
        self.recursion
    }

    pub fn input_channels(&self) -> &[usize] {
        &self.input_channels
    }

    /// Channels per order of a forward pass at the configured depth.
    pub fn output_channels(&self) -> &[usize] {
        &self.output_channels
    }

    /// Number of distinct layer instances.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&LogicLayer> {
        self.layers.get(index)
    }

    /// Index of the layer instance that runs at depth `level`.
    ///
    /// `None` for levels no layer accepts: past the configured depth without
    /// recursion, or past the point where a recursive plan stops.
    pub fn layer_for_level(&self, level: usize) -> Option<usize> {
        if let Some(&index) = self.plan.get(level) {
            return Some(index);
        }
        let start = self.cycle_start?;
        let period = self.plan.len() - start;
        self.plan.get(start + (level - start) % period).copied()
    }

    /// Deepest forward pass the machine can run, or `None` when a recursive
    /// plan cycles and any depth works.
    pub fn max_depth(&self) -> Option<usize> {
        match self.cycle_start {
            Some(_) => None,
            None => Some(self.plan.len()),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(LogicLayer::parameter_count).sum()
    }

    /// Runs the machine over `inputs`.
    ///
    /// `depth` defaults to the configured depth. Without recursion a larger
    /// value is clamped to the configured depth. With recursion the plan is
    /// followed as deep as requested, provided it reaches that far.
    pub fn forward(&self, inputs: &GroupList, depth: Option<usize>) -> Result<GroupList> {
        inputs.validate(&self.input_channels)?;

        let mut depth = depth.unwrap_or(self.depth);
        if !self.recursion && depth > self.depth {
            warn!(
                "Requested depth {} exceeds configured depth {} without recursion; clamping.",
                depth, self.depth
            );
            depth = self.depth;
        }
        if let Some(supported) = self.max_depth() {
            if depth > supported {
                return Err(LogicError::DepthUnsupported {
                    requested: depth,
                    supported,
                });
            }
        }

        let io_residual = self.residual_mode == ResidualMode::OutputOnly;
        let mut outputs = GroupList::absent(self.breadth);
        let mut current = inputs.clone();

        for level in 0..depth {
            // Previous output first, then the original inputs.
            if level > 0 && io_residual {
                current = merge_lists(current, inputs.clone())?;
            }

            let index = self
                .layer_for_level(level)
                .ok_or(LogicError::DepthUnsupported {
                    requested: depth,
                    supported: level,
                })?;
            trace!("Level {} runs layer {}", level, index);
            current = self.layers[index].forward(&current)?;
            current = self.mask_groups(current, level);

            // Every level's surviving output joins the accumulated result.
            if io_residual {
                outputs = merge_lists(outputs, current.clone())?;
            }
        }

        Ok(if io_residual { outputs } else { current })
    }

    /// Drops the orders switched off at `level`.
    fn mask_groups(&self, groups: GroupList, level: usize) -> GroupList {
        match self.connections.as_ref().and_then(|masks| masks.get(level)) {
            Some(mask) => groups
                .into_iter()
                .zip(mask.iter())
                .map(|(group, &active)| if active { group } else { Group::Absent })
                .collect(),
            None => groups,
        }
    }
}

/// Newest layer whose expected input channels equal `channels`.
fn compatible_layer(layers: &[LogicLayer], channels: &[usize]) -> Option<usize> {
    layers
        .iter()
        .rposition(|layer| layer.input_channels() == channels)
}

fn validate_connections(
    masks: &[Vec<bool>],
    depth: usize,
    breadth: usize,
) -> Result<Vec<Box<[bool]>>> {
    if masks.len() != depth {
        return Err(LogicError::ConnectionLength {
            expected: depth,
            found: masks.len(),
        });
    }
    masks
        .iter()
        .enumerate()
        .map(|(level, mask)| {
            if mask.len() == breadth + 1 {
                Ok(mask.clone().into_boxed_slice())
            } else {
                Err(LogicError::ConnectionMaskLength {
                    level,
                    expected: breadth + 1,
                    found: mask.len(),
                })
            }
        })
        .collect()
}

fn mask_channels(
    channels: &[usize],
    connections: Option<&[Box<[bool]>]>,
    level: usize,
) -> Vec<usize> {
    match connections.and_then(|masks| masks.get(level)) {
        Some(mask) => channels
            .iter()
            .zip(mask.iter())
            .map(|(&c, &active)| if active { c } else { 0 })
            .collect(),
        None => channels.to_vec(),
    }
}

fn add_channels(a: &[usize], b: &[usize]) -> Vec<usize> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn merge_lists(a: GroupList, b: GroupList) -> Result<GroupList> {
    if a.len() != b.len() {
        return Err(LogicError::GroupCount {
            expected: a.len(),
            found: b.len(),
        });
    }
    a.into_iter()
        .zip(b)
        .map(|(x, y)| x.merge(y))
        .collect::<Result<Vec<_>>>()
        .map(GroupList::new)
}
