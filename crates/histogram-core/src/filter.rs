//! Histogram filter: exact Bayesian recursion over a [`DiscreteDistribution`].

use crate::error::DistributionError;
use crate::model::{LikelihoodModel, TransitionModel};
use crate::pdf::DiscreteDistribution;
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// Inputs for one prediction step.
#[derive(Clone, Copy)]
pub struct SystemUpdate<'a> {
    pub model: &'a dyn TransitionModel,
    pub control: usize,
}

impl<'a> SystemUpdate<'a> {
    pub fn new(model: &'a dyn TransitionModel) -> Self {
        Self { model, control: 0 }
    }

    pub fn with_control(model: &'a dyn TransitionModel, control: usize) -> Self {
        Self { model, control }
    }
}

/// Inputs for one correction step.
pub struct MeasurementUpdate<'a, Z: ?Sized> {
    pub model: &'a dyn LikelihoodModel<Z>,
    pub observation: &'a Z,
    pub sensor: usize,
}

impl<'a, Z: ?Sized> MeasurementUpdate<'a, Z> {
    pub fn new(model: &'a dyn LikelihoodModel<Z>, observation: &'a Z) -> Self {
        Self {
            model,
            observation,
            sensor: 0,
        }
    }

    pub fn with_sensor(
        model: &'a dyn LikelihoodModel<Z>,
        observation: &'a Z,
        sensor: usize,
    ) -> Self {
        Self {
            model,
            observation,
            sensor,
        }
    }
}

/// Tracks a belief over `0..N` through alternating prediction and correction.
///
/// The posterior is a private copy of the prior handed to [`HistogramFilter::new`]; later
/// changes to that prior are not seen by the filter.
pub struct HistogramFilter<Z: ?Sized = usize> {
    posterior: DiscreteDistribution,
    working: Vec<f64>,
    _observation: PhantomData<fn(&Z)>,
}

impl<Z: ?Sized> HistogramFilter<Z> {
    pub fn new(prior: &DiscreteDistribution) -> Self {
        Self {
            posterior: prior.clone(),
            working: vec![0.0; prior.state_count()],
            _observation: PhantomData,
        }
    }

    /// Current belief. Borrowed from the filter; the next update rewrites it.
    pub fn posterior(&self) -> &DiscreteDistribution {
        &self.posterior
    }

    /// Runs one round of the recursion: prediction when `system` is given, then correction
    /// when `measurement` is given. A failing prediction skips the correction.
    pub fn update(
        &mut self,
        system: Option<SystemUpdate<'_>>,
        measurement: Option<MeasurementUpdate<'_, Z>>,
    ) -> Result<(), DistributionError> {
        if let Some(system) = system {
            self.predict(system)?;
        }
        if let Some(measurement) = measurement {
            self.correct(measurement)?;
        }
        Ok(())
    }

    /// Chapman-Kolmogorov step: `new[to] = sum_from P(to | from, u) * old[from]`.
    ///
    /// Fails with [`DistributionError::Degenerate`] without touching the posterior when an
    /// earlier step left it stale.
    pub fn predict(&mut self, system: SystemUpdate<'_>) -> Result<(), DistributionError> {
        self.posterior.ensure_fresh()?;
        let model = system.model;
        let control = (!model.without_inputs()).then_some(system.control);
        debug!(
            states = self.working.len(),
            control = ?control,
            "prediction step"
        );

        let previous = self.posterior.mass();
        for (to, slot) in self.working.iter_mut().enumerate() {
            *slot = previous
                .iter()
                .enumerate()
                .map(|(from, mass)| model.probability(to, from, control) * mass)
                .sum();
        }
        self.commit()
    }

    /// Bayes step: every state's mass is multiplied by the observation likelihood.
    pub fn correct(
        &mut self,
        measurement: MeasurementUpdate<'_, Z>,
    ) -> Result<(), DistributionError> {
        self.posterior.ensure_fresh()?;
        let model = measurement.model;
        let sensor = (!model.without_sensor_params()).then_some(measurement.sensor);
        debug!(
            states = self.working.len(),
            sensor = ?sensor,
            "correction step"
        );

        let previous = self.posterior.mass();
        for (state, (slot, mass)) in self.working.iter_mut().zip(previous).enumerate() {
            *slot = mass * model.likelihood(measurement.observation, state, sensor);
        }
        self.commit()
    }

    /// Stores `working` as the new posterior, normalized so repeated small likelihoods do not
    /// drive the mass toward underflow.
    fn commit(&mut self) -> Result<(), DistributionError> {
        self.posterior.set_probabilities(&self.working)?;
        self.posterior.rescale();
        Ok(())
    }
}

impl<Z: ?Sized> fmt::Debug for HistogramFilter<Z> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramFilter")
            .field("posterior", &self.posterior)
            .finish()
    }
}
