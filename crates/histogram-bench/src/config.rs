use histogram_core::SampleMethod;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_SAMPLE_SEED: u64 = 0x5eed;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root scenario configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    pub run_id: String,
    pub states: usize,
    /// Unnormalized prior weights; uniform when omitted.
    #[serde(default)]
    pub prior: Option<Vec<f64>>,
    #[serde(default)]
    pub transition: Option<TransitionConfig>,
    #[serde(default)]
    pub likelihood: Option<LikelihoodConfig>,
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub sampling: Option<SamplingConfig>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScenarioConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: ScenarioConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        if self.states == 0 {
            return Err(invalid("states", "state space must not be empty"));
        }
        if let Some(prior) = self.prior.as_ref() {
            validate_prior(prior, self.states)?;
        }
        let limits = StepLimits {
            controls: match self.transition.as_ref() {
                Some(transition) => transition.validate(self.states)?,
                None => 0,
            },
            likelihood: match self.likelihood.as_ref() {
                Some(likelihood) => Some(likelihood.validate(self.states)?),
                None => None,
            },
        };
        if self.steps.is_empty() {
            return Err(invalid("steps", "at least one step must be specified"));
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate(index, &limits)?;
        }
        if let Some(sampling) = self.sampling.as_ref() {
            sampling.validate()?;
        }
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        Ok(())
    }

    /// Resolve output templates (e.g., `{run_id}` placeholders) into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
        }
    }
}

/// Transition model block: a stationary `matrix` or one matrix per control in `controls`.
///
/// Matrices are indexed `[from][to]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransitionConfig {
    #[serde(default)]
    pub matrix: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub controls: Option<Vec<Vec<Vec<f64>>>>,
}

impl TransitionConfig {
    /// Returns how many control indexes the model accepts (0 for a stationary model).
    fn validate(&self, states: usize) -> Result<usize, ValidationError> {
        match (self.matrix.as_ref(), self.controls.as_ref()) {
            (Some(matrix), None) => {
                validate_square("transition.matrix", matrix, states)?;
                Ok(0)
            }
            (None, Some(controls)) => {
                if controls.is_empty() {
                    return Err(invalid(
                        "transition.controls",
                        "at least one control matrix is required",
                    ));
                }
                for (index, matrix) in controls.iter().enumerate() {
                    validate_square(&format!("transition.controls[{index}]"), matrix, states)?;
                }
                Ok(controls.len())
            }
            _ => Err(invalid(
                "transition",
                "exactly one of 'matrix' or 'controls' must be given",
            )),
        }
    }
}

/// Likelihood block: one `table` or one table per sensor in `sensors`.
///
/// Tables are indexed `[observation][state]`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LikelihoodConfig {
    #[serde(default)]
    pub table: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub sensors: Option<Vec<Vec<Vec<f64>>>>,
}

impl LikelihoodConfig {
    fn validate(&self, states: usize) -> Result<LikelihoodLimits, ValidationError> {
        match (self.table.as_ref(), self.sensors.as_ref()) {
            (Some(table), None) => Ok(LikelihoodLimits {
                observations: validate_table("likelihood.table", table, states)?,
                sensors: 0,
            }),
            (None, Some(sensors)) => {
                if sensors.is_empty() {
                    return Err(invalid(
                        "likelihood.sensors",
                        "at least one sensor table is required",
                    ));
                }
                let mut observations = usize::MAX;
                for (index, table) in sensors.iter().enumerate() {
                    let rows =
                        validate_table(&format!("likelihood.sensors[{index}]"), table, states)?;
                    observations = observations.min(rows);
                }
                Ok(LikelihoodLimits {
                    observations,
                    sensors: sensors.len(),
                })
            }
            _ => Err(invalid(
                "likelihood",
                "exactly one of 'table' or 'sensors' must be given",
            )),
        }
    }
}

/// One round of the filter recursion.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StepConfig {
    #[serde(default)]
    pub control: usize,
    /// Observation index; the correction is skipped when absent.
    #[serde(default)]
    pub observation: Option<usize>,
    #[serde(default)]
    pub sensor: usize,
    /// Run the prediction for this step (requires a transition block).
    #[serde(default = "default_predict")]
    pub predict: bool,
}

impl StepConfig {
    fn validate(&self, index: usize, limits: &StepLimits) -> Result<(), ValidationError> {
        let field = || format!("steps[{index}]");
        if limits.controls > 0 && self.predict && self.control >= limits.controls {
            return Err(ValidationError::InvalidField {
                field: format!("{}.control", field()),
                message: format!(
                    "control {} is outside 0..{}",
                    self.control, limits.controls
                ),
            });
        }
        if let Some(observation) = self.observation {
            let Some(likelihood) = limits.likelihood.as_ref() else {
                return Err(ValidationError::InvalidField {
                    field: format!("{}.observation", field()),
                    message: "observation given but no likelihood model is configured"
                        .to_string(),
                });
            };
            if observation >= likelihood.observations {
                return Err(ValidationError::InvalidField {
                    field: format!("{}.observation", field()),
                    message: format!(
                        "observation {observation} is outside 0..{}",
                        likelihood.observations
                    ),
                });
            }
            if likelihood.sensors > 0 && self.sensor >= likelihood.sensors {
                return Err(ValidationError::InvalidField {
                    field: format!("{}.sensor", field()),
                    message: format!(
                        "sensor {} is outside 0..{}",
                        self.sensor, likelihood.sensors
                    ),
                });
            }
        }
        Ok(())
    }
}

fn default_predict() -> bool {
    true
}

/// Optional posterior sampling after each step.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SamplingConfig {
    #[serde(default)]
    pub method: SampleMethod,
    pub count: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SamplingConfig {
    pub fn new(count: usize) -> Self {
        Self {
            method: SampleMethod::Default,
            count,
            seed: None,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SAMPLE_SEED)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.count == 0 {
            return Err(invalid(
                "sampling.count",
                "sample count must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        if self.jsonl.trim().is_empty() {
            return Err(invalid("outputs.jsonl", "path must not be empty"));
        }
        let resolved = resolve_template(run_id, &self.jsonl);
        if resolved.components().count() == 0 {
            return Err(invalid("outputs.jsonl", "resolved path is invalid"));
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

struct StepLimits {
    controls: usize,
    likelihood: Option<LikelihoodLimits>,
}

struct LikelihoodLimits {
    observations: usize,
    sensors: usize,
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(invalid("run_id", "run_id must not be empty"));
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(invalid(
            "run_id",
            "run_id may only contain alphanumeric characters, '.', '_' or '-'",
        ));
    }

    Ok(())
}

fn validate_prior(prior: &[f64], states: usize) -> Result<(), ValidationError> {
    if prior.len() != states {
        return Err(ValidationError::InvalidField {
            field: "prior".to_string(),
            message: format!("prior has {} entries, expected {states}", prior.len()),
        });
    }
    if prior.iter().any(|value| !value.is_finite() || *value < 0.0) {
        return Err(invalid("prior", "weights must be finite and non-negative"));
    }
    if prior.iter().sum::<f64>() <= 0.0 {
        return Err(invalid("prior", "weights must not all be zero"));
    }
    Ok(())
}

fn validate_square(
    field: &str,
    matrix: &[Vec<f64>],
    states: usize,
) -> Result<(), ValidationError> {
    if matrix.len() != states {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            message: format!("matrix has {} rows, expected {states}", matrix.len()),
        });
    }
    validate_rows(field, matrix, states)
}

/// Returns the number of observation rows.
fn validate_table(
    field: &str,
    table: &[Vec<f64>],
    states: usize,
) -> Result<usize, ValidationError> {
    if table.is_empty() {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            message: "table must have at least one observation row".to_string(),
        });
    }
    validate_rows(field, table, states)?;
    Ok(table.len())
}

fn validate_rows(field: &str, rows: &[Vec<f64>], states: usize) -> Result<(), ValidationError> {
    for (index, row) in rows.iter().enumerate() {
        if row.len() != states {
            return Err(ValidationError::InvalidField {
                field: format!("{field}[{index}]"),
                message: format!("row has {} entries, expected {states}", row.len()),
            });
        }
        if let Some(value) = row.iter().find(|value| !(0.0..=1.0).contains(*value)) {
            return Err(ValidationError::InvalidField {
                field: format!("{field}[{index}]"),
                message: format!("{value} is not a probability"),
            });
        }
    }
    Ok(())
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    let replaced = template.replace("{run_id}", run_id);
    PathBuf::from(replaced)
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
