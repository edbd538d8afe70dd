//! Error types for the logic machine library.
//!
//! Every failure is fatal for the call that raised it: construction errors
//! reject the parameters, dimension errors reject the inputs, and no partial
//! group list is ever handed back.

use ndarray::ShapeError;
use thiserror::Error;

/// Errors raised while building or running a logic machine.
#[derive(Error, Debug)]
pub enum LogicError {
    // --- Construction contract violations ---
    #[error("breadth must be positive, got {0}")]
    InvalidBreadth(usize),
    #[error("depth must be positive, got {0}")]
    InvalidDepth(usize),
    #[error("hidden dimension must be positive, got {0}")]
    InvalidHidden(usize),
    #[error("exactly one of residual ({residual}) and io_residual ({io_residual}) must be set")]
    ResidualConflict { residual: bool, io_residual: bool },
    #[error("recursion cannot be combined with full residual connections")]
    RecursionWithResidual,
    #[error("per-order channel list has {found} entries, expected {expected}")]
    ChannelListLength { expected: usize, found: usize },
    #[error("connection list has {found} masks, expected one per depth level ({expected})")]
    ConnectionLength { expected: usize, found: usize },
    #[error("connection mask at level {level} has {found} entries, expected {expected}")]
    ConnectionMaskLength {
        level: usize,
        expected: usize,
        found: usize,
    },

    // --- Dimension contract violations ---
    #[error("group list has {found} groups, expected {expected}")]
    GroupCount { expected: usize, found: usize },
    #[error("order {order} carries {found} channels, expected {expected}")]
    ChannelMismatch {
        order: usize,
        expected: usize,
        found: usize,
    },
    #[error("order {order} array has rank {found}, expected {expected}")]
    RankMismatch {
        order: usize,
        expected: usize,
        found: usize,
    },
    #[error("order {order} has {found} objects on an object axis, expected {expected}")]
    ObjectCountMismatch {
        order: usize,
        expected: usize,
        found: usize,
    },
    #[error("order {order} has batch size {found}, expected {expected}")]
    BatchMismatch {
        order: usize,
        expected: usize,
        found: usize,
    },
    #[error("depth {requested} reaches a level no layer accepts; at most {supported} levels run")]
    DepthUnsupported { requested: usize, supported: usize },
    #[error("expanding an order-0 group needs an explicit object count")]
    MissingObjectCount,
    #[error("inference function expects {expected} features, got {found}")]
    FeatureMismatch { expected: usize, found: usize },
    #[error("array shape error: {0}")]
    Shape(#[from] ShapeError),

    // --- Configuration ---
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, LogicError>;
