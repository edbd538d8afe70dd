// src/config.rs

//! Construction parameters for a [`Machine`].
//!
//! The same struct is built in code, deserialized from a JSON file, or
//! assembled by the command-line front end. Every field has a default, so a
//! configuration file only needs to name what it changes.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{LogicError, Result};
use crate::group::ChannelSpec;
use crate::machine::{Machine, ResidualMode};

// --- Top-Level Configuration Structure ---

/// Everything needed to build a logic machine.
///
/// `residual` and `io_residual` are mutually exclusive and exactly one must
/// be set; `recursion` requires `io_residual`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Number of stacked logic layers.
    pub depth: usize,
    /// Highest predicate order handled.
    pub breadth: usize,
    /// Input channels per order (one value, or `breadth + 1` values).
    pub input_channels: ChannelSpec,
    /// Requested output channels per order.
    pub output_channels: ChannelSpec,
    /// Hidden width of every inference MLP.
    pub hidden_dimension: usize,
    /// Keep reflexive tuples out of reductions.
    pub exclude_self: bool,
    /// Full residual: each layer prepends its input to its output.
    pub residual: bool,
    /// Output-only residual: re-merge the inputs and accumulate outputs.
    pub io_residual: bool,
    /// Share weights across levels past the third.
    pub recursion: bool,
    /// Optional per-level masks of active orders.
    pub connections: Option<Vec<Vec<bool>>>,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            depth: 3,
            breadth: 2,
            input_channels: ChannelSpec::Uniform(8),
            output_channels: ChannelSpec::Uniform(8),
            hidden_dimension: 128,
            exclude_self: false,
            residual: false,
            io_residual: true,
            recursion: false,
            connections: None,
            seed: 0,
        }
    }
}

impl MachineConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = MachineConfig::from_json(&text)?;
        info!("Loaded machine configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Residual mode implied by the two residual flags.
    pub fn residual_mode(&self) -> Result<ResidualMode> {
        ResidualMode::from_flags(self.residual, self.io_residual)
    }

    /// Resolved per-order input channels.
    pub fn resolved_inputs(&self) -> Result<Vec<usize>> {
        if self.breadth == 0 {
            return Err(LogicError::InvalidBreadth(self.breadth));
        }
        self.input_channels.resolve(self.breadth)
    }

    pub fn build(&self) -> Result<Machine> {
        Machine::new(self)
    }
}
