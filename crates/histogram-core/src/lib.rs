#![deny(warnings)]
//! Exact Bayesian filtering over a finite, enumerable state space.
//!
//! - `pdf`: the discrete distribution and its cumulative table / samplers.
//! - `filter`: the histogram filter driving prediction and correction.
//! - `model`: transition and likelihood model traits plus table-backed models.
//! - `telemetry`: summary metrics of a posterior.

pub mod error;
pub mod filter;
pub mod model;
pub mod pdf;
pub mod telemetry;

pub use error::{DistributionError, ModelError};
pub use filter::{HistogramFilter, MeasurementUpdate, SystemUpdate};
pub use model::{
    ControlledTransition, LikelihoodModel, LikelihoodTable, SensorLikelihood, TransitionMatrix,
    TransitionModel,
};
pub use pdf::{DiscreteDistribution, SampleMethod};
pub use telemetry::PosteriorMetrics;
