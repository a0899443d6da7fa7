//! Probability mass functions over `0..N`.
//!
//! - `discrete`: the mass vector, its cached normalizer and cumulative table.
//! - `method`: sampling strategy selector.

mod discrete;
mod method;

pub use discrete::{CUMULATIVE_TOLERANCE, DiscreteDistribution};
pub use method::SampleMethod;
