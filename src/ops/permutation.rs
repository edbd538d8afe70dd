//! Permutation expansion: every ordering of an order-`r` group's object axes,
//! concatenated along the feature axis.

use ndarray::{concatenate, ArrayD, Axis, IxDyn};

use crate::error::{LogicError, Result};

/// Emits all `r!` axis orderings of an order-`r` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationExpander {
    order: usize,
}

impl PermutationExpander {
    pub fn new(order: usize) -> Self {
        PermutationExpander { order }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Concatenates every reordering of the object axes of `input`
    /// (`[batch, n^r, c]` to `[batch, n^r, c * r!]`).
    ///
    /// Blocks follow lexicographic order of the axis permutation, starting
    /// with the identity. Orders 0 and 1 pass through unchanged.
    pub fn apply(&self, input: ArrayD<f32>) -> Result<ArrayD<f32>> {
        if self.order <= 1 {
            return Ok(input);
        }
        let rank = self.order + 2;
        if input.ndim() != rank {
            return Err(LogicError::RankMismatch {
                order: self.order,
                expected: rank,
                found: input.ndim(),
            });
        }

        let object_axes: Vec<usize> = (1..=self.order).collect();
        let views: Vec<_> = permutations(&object_axes)
            .into_iter()
            .map(|perm| {
                let mut axes = Vec::with_capacity(rank);
                axes.push(0);
                axes.extend(perm);
                axes.push(rank - 1);
                input.view().permuted_axes(IxDyn(&axes))
            })
            .collect();

        Ok(concatenate(Axis(rank - 1), &views)?)
    }

    /// Channel count after expansion: `input_channels * r!`.
    pub fn output_dimension(&self, input_channels: usize) -> usize {
        input_channels * factorial(self.order)
    }
}

pub fn factorial(n: usize) -> usize {
    (1..=n).product()
}

/// All orderings of `items`, in lexicographic order of position.
pub fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..items.len()).collect();
    let mut out = Vec::with_capacity(factorial(items.len()));
    loop {
        out.push(indices.iter().map(|&i| items[i]).collect());

        // Next permutation: find the rightmost ascent, swap with the smallest
        // larger element to its right, then reverse the suffix.
        let Some(pivot) = (1..indices.len())
            .rev()
            .find(|&i| indices[i - 1] < indices[i])
        else {
            return out;
        };
        let pivot = pivot - 1;
        let Some(successor) = (pivot + 1..indices.len())
            .rev()
            .find(|&j| indices[j] > indices[pivot])
        else {
            return out;
        };
        indices.swap(pivot, successor);
        indices[pivot + 1..].reverse();
    }
}
