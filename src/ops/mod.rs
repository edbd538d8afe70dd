//! Structural operators that move predicate groups between orders.

pub mod expander;
pub mod mask;
pub mod permutation;
pub mod reducer;

pub use expander::Expander;
pub use permutation::PermutationExpander;
pub use reducer::{Quantifier, Reducer};
