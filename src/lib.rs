//! # Logic Machine
//!
//! A multi-order relational reasoning engine in the style of Neural Logic
//! Machines. Predicates over a set of `n` objects are held as arrays, one
//! group per arity ("order"), and a stack of logic layers repeatedly
//! expands, reduces, permutes and infers across those groups.
//!
//! ```text
//! order 0   [batch, c0]             global facts
//! order 1   [batch, n, c1]          per-object facts
//! order 2   [batch, n, n, c2]       per-pair facts
//! ...
//! ```
//!
//! Build a [`Machine`] from a [`MachineConfig`], then call
//! [`Machine::forward`] with a [`GroupList`] of `breadth + 1` groups.

pub mod config;
pub mod error;
pub mod group;
pub mod inference;
pub mod layer;
pub mod machine;
pub mod ops;

pub use config::MachineConfig;
pub use error::{LogicError, Result};
pub use group::{ChannelSpec, Group, GroupList};
pub use inference::{InferenceFunction, LogicInference};
pub use layer::{LayerOptions, LogicLayer};
pub use machine::{Machine, ResidualMode};
