use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use histogram_bench::config::{ResolvedOutputs, SamplingConfig, ScenarioConfig};
use histogram_bench::logging::init_logging;
use histogram_bench::runner::ScenarioRunner;
use histogram_core::SampleMethod;

/// Scenario runner for the discrete histogram filter.
#[derive(Debug, Parser)]
#[command(
    name = "histogram-bench",
    author,
    version,
    about = "Runs a histogram filter scenario and logs the posterior per step"
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short, long, value_name = "FILE", default_value = "scenarios/ring.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the posterior sampling seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Override the number of posterior samples drawn after each step.
    #[arg(long, value_name = "COUNT")]
    samples: Option<usize>,

    /// Override the sampling method (default, order_statistics).
    #[arg(long, value_name = "METHOD")]
    method: Option<String>,

    /// Exit after validating the scenario (the filter is not run).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ScenarioConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if cli.seed.is_some() || cli.samples.is_some() || cli.method.is_some() {
        let sampling = config
            .sampling
            .get_or_insert_with(|| SamplingConfig::new(1));
        if let Some(seed) = cli.seed {
            sampling.seed = Some(seed);
        }
        if let Some(count) = cli.samples {
            sampling.count = count;
        }
        if let Some(method) = cli.method.as_deref() {
            sampling.method = SampleMethod::from_str(method)?;
        }
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let states = config.states;
    let steps = config.steps.len();

    println!(
        "Loaded scenario '{run_id}' with {states} state{} and {steps} step{}",
        if states == 1 { "" } else { "s" },
        if steps == 1 { "" } else { "s" }
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = ScenarioRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: filter execution skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Run complete for '{run_id}': {} of {steps} steps → {} rows at {}",
        summary.steps_run,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    if let Some(step) = summary.degenerate_at {
        anyhow::bail!("posterior collapsed at step {step}: no state explains the observations");
    }

    Ok(())
}
