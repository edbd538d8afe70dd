//! Reduction: quantifies an order-`r` group down to order `r - 1` by pooling
//! over its last object axis.

use ndarray::{ArrayD, Axis, Dimension, IxDyn};

use super::mask::{exclude_mask, mask_value};
use crate::error::{LogicError, Result};

/// Which quantifiers a reducer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quantifier {
    /// Max pooling ("exists") and min pooling ("forall") side by side.
    #[default]
    Exists,
    /// Min pooling only.
    Forall,
}

/// Pools an order-`r` group over its innermost object axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reducer {
    input_order: usize,
    exclude_self: bool,
    quantifier: Quantifier,
}

impl Reducer {
    /// Reducer taking order-`input_order` groups to order `input_order - 1`.
    pub fn new(input_order: usize, exclude_self: bool) -> Self {
        Reducer::with_quantifier(input_order, exclude_self, Quantifier::Exists)
    }

    pub fn with_quantifier(input_order: usize, exclude_self: bool, quantifier: Quantifier) -> Self {
        Reducer {
            input_order,
            exclude_self,
            quantifier,
        }
    }

    pub fn input_order(&self) -> usize {
        self.input_order
    }

    pub fn exclude_self(&self) -> bool {
        self.exclude_self
    }

    pub fn quantifier(&self) -> Quantifier {
        self.quantifier
    }

    /// Reduces `[batch, n^r, c]` to `[batch, n^(r-1), c']`.
    ///
    /// With `Exists`, channel `2k` holds the max-pool and `2k + 1` the
    /// min-pool of input channel `k`. When excluding self, entries whose
    /// object indices are not pairwise distinct are replaced by 0 before the
    /// max-pool and by 1 before the min-pool, so they can never decide either.
    pub fn apply(&self, input: &ArrayD<f32>) -> Result<ArrayD<f32>> {
        let rank = self.input_order + 2;
        if self.input_order == 0 || input.ndim() != rank {
            return Err(LogicError::RankMismatch {
                order: self.input_order,
                expected: rank,
                found: input.ndim(),
            });
        }

        let (for_max, for_min) = if self.exclude_self {
            let mask = exclude_mask(input.shape(), self.input_order, 1)?;
            (
                mask_value(input, &mask, 0.0)?,
                mask_value(input, &mask, 1.0)?,
            )
        } else {
            (input.clone(), input.clone())
        };

        let pooled = Axis(rank - 2);
        let forall = for_min.fold_axis(pooled, f32::INFINITY, |&acc, &x| acc.min(x));
        match self.quantifier {
            Quantifier::Forall => Ok(forall),
            Quantifier::Exists => {
                let exists = for_max.fold_axis(pooled, f32::NEG_INFINITY, |&acc, &x| acc.max(x));
                Ok(interleave(&exists, &forall))
            }
        }
    }

    /// Channel count after reduction.
    pub fn output_dimension(&self, input_channels: usize) -> usize {
        match self.quantifier {
            Quantifier::Exists => input_channels * 2,
            Quantifier::Forall => input_channels,
        }
    }
}

/// Pairs channels of two equally shaped arrays: `[a0, b0, a1, b1, ..]`.
fn interleave(a: &ArrayD<f32>, b: &ArrayD<f32>) -> ArrayD<f32> {
    let last = a.ndim() - 1;
    let mut shape = a.shape().to_vec();
    shape[last] *= 2;
    ArrayD::from_shape_fn(IxDyn(&shape), |index| {
        let mut source = index.slice().to_vec();
        let channel = source[last];
        source[last] = channel / 2;
        if channel % 2 == 0 {
            a[source.as_slice()]
        } else {
            b[source.as_slice()]
        }
    })
}
