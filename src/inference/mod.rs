//! # Group Inference Functions
//!
//! The learned step of every logic layer: a function from one feature
//! vector to another, applied independently at every tuple position of a
//! group.
//!
//! ```text
//! [batch, n, .., n, K] --flatten--> [rows, K] --apply--> [rows, M]
//!                      --restore--> [batch, n, .., n, M]
//! ```
//!
//! [`LogicInference`] is the stock implementation: an [`Mlp`] followed by a
//! sigmoid squash into `[0, 1]`. Anything implementing [`InferenceFunction`]
//! can stand in for it.

pub mod mlp;

use std::fmt;

use ndarray::{Array2, ArrayD, ArrayView2, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{LogicError, Result};
pub use mlp::{Linear, Mlp};

/// Contract for the learned function applied inside each group.
pub trait InferenceFunction: fmt::Debug {
    /// Features consumed per tuple position.
    fn input_dimension(&self) -> usize;

    /// Features produced per tuple position.
    fn output_dimension(&self) -> usize;

    /// Maps every row of `rows` (`[count, input_dimension]`) independently.
    fn apply(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>>;

    /// Number of learned scalars.
    fn parameter_count(&self) -> usize;

    /// Applies the function to every tuple position of a group array,
    /// keeping all leading axes and replacing the feature axis.
    fn apply_grouped(&self, input: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape = input.shape();
        let Some((&features, leading)) = shape.split_last() else {
            return Err(LogicError::FeatureMismatch {
                expected: self.input_dimension(),
                found: 0,
            });
        };
        let count: usize = leading.iter().product();
        let rows = Array2::from_shape_vec((count, features), input.iter().copied().collect())?;
        let out = self.apply(rows.view())?;

        let mut out_shape = leading.to_vec();
        out_shape.push(out.ncols());
        Ok(ArrayD::from_shape_vec(
            IxDyn(&out_shape),
            out.iter().copied().collect(),
        )?)
    }
}

/// Logistic squash into `[0, 1]`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// MLP inference with an optional final sigmoid squash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicInference {
    mlp: Mlp,
    squash: bool,
}

impl LogicInference {
    /// Builds an MLP `input -> hidden.. -> output` ending in a sigmoid.
    pub fn new<R: Rng>(
        input_dimension: usize,
        hidden_dimensions: &[usize],
        output_dimension: usize,
        rng: &mut R,
    ) -> Self {
        LogicInference {
            mlp: Mlp::new(input_dimension, hidden_dimensions, output_dimension, rng),
            squash: true,
        }
    }

    /// Same network without the final squash.
    pub fn unsquashed<R: Rng>(
        input_dimension: usize,
        hidden_dimensions: &[usize],
        output_dimension: usize,
        rng: &mut R,
    ) -> Self {
        LogicInference {
            squash: false,
            ..LogicInference::new(input_dimension, hidden_dimensions, output_dimension, rng)
        }
    }

    pub fn squash(&self) -> bool {
        self.squash
    }

    pub fn mlp(&self) -> &Mlp {
        &self.mlp
    }
}

impl InferenceFunction for LogicInference {
    fn input_dimension(&self) -> usize {
        self.mlp.input_dimension()
    }

    fn output_dimension(&self) -> usize {
        self.mlp.output_dimension()
    }

    fn apply(&self, rows: ArrayView2<'_, f32>) -> Result<Array2<f32>> {
        let out = self.mlp.forward(rows)?;
        if self.squash {
            Ok(out.mapv_into(sigmoid))
        } else {
            Ok(out)
        }
    }

    fn parameter_count(&self) -> usize {
        self.mlp.parameter_count()
    }
}
