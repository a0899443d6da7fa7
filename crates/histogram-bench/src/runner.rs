use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use histogram_core::{
    ControlledTransition, DiscreteDistribution, DistributionError, HistogramFilter,
    LikelihoodModel, LikelihoodTable, MeasurementUpdate, ModelError, PosteriorMetrics,
    SensorLikelihood, SystemUpdate, TransitionMatrix, TransitionModel,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{
    LikelihoodConfig, ResolvedOutputs, SamplingConfig, ScenarioConfig, StepConfig,
    TransitionConfig,
};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid model: {0}")]
    Model(#[from] ModelError),
    #[error("invalid prior: {0}")]
    Prior(#[source] DistributionError),
    #[error("filter failed: {0}")]
    Filter(#[source] DistributionError),
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode row: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps_run: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    /// Step index at which the posterior lost all mass; the run stops there.
    pub degenerate_at: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StepRow<'a> {
    run_id: &'a str,
    step: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    control: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    observation: Option<usize>,
    posterior: Vec<f64>,
    map_state: usize,
    map_probability: f64,
    entropy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<Vec<usize>>,
}

/// Drives a [`HistogramFilter`] through the steps of a scenario.
pub struct ScenarioRunner {
    config: ScenarioConfig,
    outputs: ResolvedOutputs,
    prior: DiscreteDistribution,
    transition: Option<Box<dyn TransitionModel>>,
    likelihood: Option<Box<dyn LikelihoodModel<usize>>>,
}

impl ScenarioRunner {
    /// Builds the prior and models. `config` is expected to be validated.
    pub fn new(config: ScenarioConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let prior = match config.prior.as_ref() {
            Some(weights) => DiscreteDistribution::from_probabilities(weights.clone())
                .map_err(RunnerError::Prior)?,
            None if config.states > 0 => DiscreteDistribution::new(config.states),
            None => return Err(RunnerError::Prior(DistributionError::NoStates)),
        };
        let transition = config.transition.as_ref().map(build_transition).transpose()?;
        let likelihood = config.likelihood.as_ref().map(build_likelihood).transpose()?;

        Ok(Self {
            config,
            outputs,
            prior,
            transition,
            likelihood,
        })
    }

    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        if let Some(parent) = self.outputs.jsonl.parent() {
            fs::create_dir_all(parent).map_err(|source| RunnerError::Io {
                context: "creating output directory",
                source,
            })?;
        }
        let file = File::create(&self.outputs.jsonl).map_err(|source| RunnerError::Io {
            context: "creating posterior log",
            source,
        })?;
        let mut writer = BufWriter::new(file);

        let run_id = self.config.run_id.as_str();
        let sampling = self.config.sampling.as_ref();
        let mut rng = StdRng::seed_from_u64(sampling.map_or(0, SamplingConfig::seed));
        let mut filter: HistogramFilter = HistogramFilter::new(&self.prior);

        let mut summary = RunSummary {
            steps_run: 0,
            rows_written: 0,
            jsonl_path: self.outputs.jsonl.clone(),
            degenerate_at: None,
        };

        for (index, step) in self.config.steps.iter().enumerate() {
            let system = self.system_update(step);
            let measurement = self.measurement_update(step);
            let control = system.map(|update| update.control);

            match filter.update(system, measurement) {
                Ok(()) => {}
                Err(DistributionError::Degenerate { weight_sum }) => {
                    warn!(run_id, step = index, weight_sum, "posterior collapsed; stopping run");
                    summary.degenerate_at = Some(index);
                    break;
                }
                Err(other) => return Err(RunnerError::Filter(other)),
            }
            summary.steps_run += 1;

            let posterior = filter.posterior();
            let metrics =
                PosteriorMetrics::from_distribution(posterior).map_err(RunnerError::Filter)?;
            let samples = sampling
                .map(|request| posterior.sample_many(request.count, request.method, &mut rng))
                .transpose()
                .map_err(RunnerError::Filter)?;

            info!(
                run_id,
                step = index,
                map_state = metrics.map_state,
                map_probability = metrics.map_probability,
                entropy = metrics.entropy,
                "filter step"
            );

            let row = StepRow {
                run_id,
                step: index,
                control,
                observation: step.observation,
                posterior: posterior
                    .normalized_probabilities()
                    .map_err(RunnerError::Filter)?,
                map_state: metrics.map_state,
                map_probability: metrics.map_probability,
                entropy: metrics.entropy,
                samples,
            };
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n").map_err(|source| RunnerError::Io {
                context: "writing posterior row",
                source,
            })?;
            summary.rows_written += 1;
        }

        writer.flush().map_err(|source| RunnerError::Io {
            context: "flushing posterior log",
            source,
        })?;
        Ok(summary)
    }

    fn system_update(&self, step: &StepConfig) -> Option<SystemUpdate<'_>> {
        if !step.predict {
            return None;
        }
        self.transition
            .as_deref()
            .map(|model| SystemUpdate::with_control(model, step.control))
    }

    fn measurement_update<'a>(
        &'a self,
        step: &'a StepConfig,
    ) -> Option<MeasurementUpdate<'a, usize>> {
        let observation = step.observation.as_ref()?;
        self.likelihood
            .as_deref()
            .map(|model| MeasurementUpdate::with_sensor(model, observation, step.sensor))
    }
}

fn build_transition(config: &TransitionConfig) -> Result<Box<dyn TransitionModel>, ModelError> {
    if let Some(matrix) = config.matrix.as_ref() {
        return Ok(Box::new(TransitionMatrix::new(matrix.clone())?));
    }
    let matrices = config
        .controls
        .iter()
        .flatten()
        .map(|matrix| TransitionMatrix::new(matrix.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(ControlledTransition::new(matrices)?))
}

fn build_likelihood(
    config: &LikelihoodConfig,
) -> Result<Box<dyn LikelihoodModel<usize>>, ModelError> {
    if let Some(table) = config.table.as_ref() {
        return Ok(Box::new(LikelihoodTable::new(table.clone())?));
    }
    let tables = config
        .sensors
        .iter()
        .flatten()
        .map(|table| LikelihoodTable::new(table.clone()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Box::new(SensorLikelihood::new(tables)?))
}
