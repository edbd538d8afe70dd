//! # Logic Layer
//!
//! One depth step of the machine. For every order `r` in `0..=breadth` the
//! layer gathers evidence from the neighbouring orders, permutes it, and runs
//! the order's inference function:
//!
//! ```text
//!            expand(r-1) ──┐
//!   inputs[r] ─────────────┼─ concat ─ permute ─ infer ─┬─> outputs[r]
//!            reduce(r+1) ──┘                            │
//!   inputs[r] ──────────────────────── (residual) ──────┘
//! ```
//!
//! Channel bookkeeping is done once at construction. A forward pass that
//! disagrees with it is a contract violation and fails the whole call.

#[cfg(test)]
mod tests;

use log::{debug, warn};
use rand::Rng;

use crate::error::{LogicError, Result};
use crate::group::{ChannelSpec, Group, GroupList};
use crate::inference::{InferenceFunction, LogicInference};
use crate::ops::mask::concat_features;
use crate::ops::{Expander, PermutationExpander, Reducer};

// ============================================================================
// Construction Options
// ============================================================================

/// Breadth above which permutation expansion (`r!` blocks) gets expensive.
pub const BREADTH_WARNING_THRESHOLD: usize = 3;

/// Per-layer switches shared by every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerOptions {
    /// Hidden width of each order's inference MLP.
    pub hidden_dimension: usize,
    /// Keep reflexive tuples out of the reductions.
    pub exclude_self: bool,
    /// Concatenate each order's input in front of its output.
    pub residual: bool,
}

// ============================================================================
// Per-order Slots
// ============================================================================

/// Permutation and inference for an order that has something to compute.
#[derive(Debug)]
struct OrderLogic {
    permutation: PermutationExpander,
    inference: Box<dyn InferenceFunction>,
}

/// Operators owned by one order of the layer.
#[derive(Debug)]
struct OrderSlot {
    expander: Option<Expander>,
    reducer: Option<Reducer>,
    /// `None` when the order is inert at this layer.
    logic: Option<OrderLogic>,
}

// ============================================================================
// Logic Layer
// ============================================================================

/// A single depth step over all orders `0..=breadth`.
#[derive(Debug)]
pub struct LogicLayer {
    breadth: usize,
    residual: bool,
    input_channels: Box<[usize]>,
    output_channels: Box<[usize]>,
    orders: Box<[OrderSlot]>,
}

impl LogicLayer {
    /// Builds the layer and predicts its per-order output channels.
    ///
    /// An order is inert, with no inference function and 0 output channels
    /// before the residual, when nothing contributes to it or when its
    /// requested output width is 0.
    pub fn new<R: Rng>(
        breadth: usize,
        input_channels: &ChannelSpec,
        output_channels: &ChannelSpec,
        options: LayerOptions,
        rng: &mut R,
    ) -> Result<Self> {
        if breadth == 0 {
            return Err(LogicError::InvalidBreadth(breadth));
        }
        if options.hidden_dimension == 0 {
            return Err(LogicError::InvalidHidden(options.hidden_dimension));
        }
        if breadth > BREADTH_WARNING_THRESHOLD {
            warn!(
                "Breadth {} exceeds {}; permutation expansion may be slow and memory hungry.",
                breadth, BREADTH_WARNING_THRESHOLD
            );
        }

        let inputs = input_channels.resolve(breadth)?;
        let mut outputs = output_channels.resolve(breadth)?;
        let mut orders = Vec::with_capacity(breadth + 1);

        for order in 0..=breadth {
            // Own channels, plus whatever the neighbouring orders lend.
            let mut current = inputs[order];

            let expander = (order > 0).then(|| Expander::new(order - 1));
            if let Some(expander) = &expander {
                current += expander.output_dimension(inputs[order - 1]);
            }

            let reducer = (order < breadth).then(|| Reducer::new(order + 1, options.exclude_self));
            if let Some(reducer) = &reducer {
                current += reducer.output_dimension(inputs[order + 1]);
            }

            // Nothing gathered or nothing requested: no inference for this order.
            let logic = if current == 0 || outputs[order] == 0 {
                outputs[order] = 0;
                None
            } else {
                let permutation = PermutationExpander::new(order);
                let features = permutation.output_dimension(current);
                let inference =
                    LogicInference::new(features, &[options.hidden_dimension], outputs[order], rng);
                Some(OrderLogic {
                    permutation,
                    inference: Box::new(inference),
                })
            };

            debug!(
                "order {}: {} gathered channels, inference {}, {} out",
                order,
                current,
                logic
                    .as_ref()
                    .map_or("none".to_string(), |l| format!(
                        "{} -> {}",
                        l.inference.input_dimension(),
                        l.inference.output_dimension()
                    )),
                outputs[order]
            );

            orders.push(OrderSlot {
                expander,
                reducer,
                logic,
            });
        }

        // Residual prepends the input, inert orders included.
        if options.residual {
            for (output, input) in outputs.iter_mut().zip(&inputs) {
                *output += input;
            }
        }

        Ok(LogicLayer {
            breadth,
            residual: options.residual,
            input_channels: inputs.into_boxed_slice(),
            output_channels: outputs.into_boxed_slice(),
            orders: orders.into_boxed_slice(),
        })
    }

    pub fn breadth(&self) -> usize {
        self.breadth
    }

    pub fn residual(&self) -> bool {
        self.residual
    }

    /// Channels expected per order on input.
    pub fn input_channels(&self) -> &[usize] {
        &self.input_channels
    }

    /// Channels produced per order, residual included.
    pub fn output_channels(&self) -> &[usize] {
        &self.output_channels
    }

    /// True when the order builds no inference function at this layer.
    pub fn is_inert(&self, order: usize) -> bool {
        self.orders
            .get(order)
            .map_or(true, |slot| slot.logic.is_none())
    }

    /// The inference function of `order`, if the order is active.
    pub fn inference(&self, order: usize) -> Option<&dyn InferenceFunction> {
        self.orders
            .get(order)
            .and_then(|slot| slot.logic.as_ref())
            .map(|logic| logic.inference.as_ref())
    }

    pub fn parameter_count(&self) -> usize {
        self.orders
            .iter()
            .filter_map(|slot| slot.logic.as_ref())
            .map(|logic| logic.inference.parameter_count())
            .sum()
    }

    /// Runs the layer over a full group list.
    pub fn forward(&self, inputs: &GroupList) -> Result<GroupList> {
        inputs.validate(&self.input_channels)?;
        let objects = inputs.object_count();

        let mut outputs = Vec::with_capacity(self.breadth + 1);
        for (order, slot) in self.orders.iter().enumerate() {
            let mut gathered = Vec::with_capacity(3);

            // Expand the order below, keep our own, reduce the order above.
            let lower = order
                .checked_sub(1)
                .and_then(|lower| inputs.get(lower))
                .and_then(Group::array);
            if let (Some(expander), Some(lower)) = (&slot.expander, lower) {
                // Order 0 has no object axis to read `n` from.
                let n = if order == 1 {
                    Some(objects.ok_or(LogicError::MissingObjectCount)?)
                } else {
                    None
                };
                gathered.push(expander.apply(lower, n)?);
            }
            if let Some(own) = inputs[order].array() {
                gathered.push(own.clone());
            }
            let upper = inputs.get(order + 1).and_then(Group::array);
            if let (Some(reducer), Some(upper)) = (&slot.reducer, upper) {
                gathered.push(reducer.apply(upper)?);
            }

            // Concatenate, permute, then infer per tuple position.
            let mut output = match (&slot.logic, gathered.is_empty()) {
                (Some(logic), false) => {
                    let features = logic.permutation.apply(concat_features(gathered)?)?;
                    Group::from_array(logic.inference.apply_grouped(&features)?)
                }
                _ => Group::Absent,
            };

            // Residual: input first, then the inferred channels.
            if self.residual {
                output = inputs[order].clone().merge(output)?;
            }

            // Construction-time bookkeeping is the contract for every call.
            if output.channels() != self.output_channels[order] {
                return Err(LogicError::ChannelMismatch {
                    order,
                    expected: self.output_channels[order],
                    found: output.channels(),
                });
            }
            outputs.push(output);
        }

        Ok(GroupList::new(outputs))
    }
}
