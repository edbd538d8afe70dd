//! Expansion: lifts an order-`r` group into order `r + 1` by broadcasting it
//! across a new object axis.

use ndarray::{ArrayD, Axis};

use super::mask::broadcast;
use crate::error::{LogicError, Result};

/// Inserts a new object axis after the last existing one and repeats the
/// features along it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expander {
    input_order: usize,
}

impl Expander {
    /// Expander taking order-`input_order` groups to order `input_order + 1`.
    pub fn new(input_order: usize) -> Self {
        Expander { input_order }
    }

    pub fn input_order(&self) -> usize {
        self.input_order
    }

    /// Expands `input` (`[batch, n^r, c]`) to `[batch, n^r, n, c]`.
    ///
    /// `n` is required for order-0 inputs, which have no object axis to
    /// read it from; otherwise it defaults to the size of the last object axis.
    pub fn apply(&self, input: &ArrayD<f32>, n: Option<usize>) -> Result<ArrayD<f32>> {
        let rank = self.input_order + 2;
        if input.ndim() != rank {
            return Err(LogicError::RankMismatch {
                order: self.input_order,
                expected: rank,
                found: input.ndim(),
            });
        }
        let n = match (self.input_order, n) {
            (_, Some(n)) => n,
            (0, None) => return Err(LogicError::MissingObjectCount),
            (order, None) => input.shape()[order],
        };

        let axis = self.input_order + 1;
        broadcast(input.view().insert_axis(Axis(axis)), axis, n)
    }

    /// Expansion leaves the channel count unchanged.
    pub fn output_dimension(&self, input_channels: usize) -> usize {
        input_channels
    }
}
