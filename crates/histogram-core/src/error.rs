//! Error types surfaced by distributions, filters and table models.

use thiserror::Error;

/// Failures reported by [`crate::DiscreteDistribution`] and propagated by the filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DistributionError {
    #[error("state {index} is outside the state space 0..{states}")]
    OutOfRange { index: usize, states: usize },
    #[error("vector has {actual} entries but the state space has {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("total probability mass {weight_sum} is not positive")]
    Degenerate { weight_sum: f64 },
    #[error("sampling method '{method}' is not supported here")]
    UnsupportedMethod { method: String },
    #[error("a distribution needs at least one state")]
    NoStates,
}

/// Failures raised while building table-backed models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("model table is empty")]
    Empty,
    #[error("transition matrix has {rows} rows but row {row} has {cols} columns")]
    NotSquare { rows: usize, row: usize, cols: usize },
    #[error("table row {row} has {cols} columns, expected {expected}")]
    RaggedTable { row: usize, cols: usize, expected: usize },
    #[error("entry ({row}, {col}) = {value} is not a probability")]
    InvalidProbability { row: usize, col: usize, value: f64 },
}
