use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

const TELEMETRY_FILE: &str = "telemetry.jsonl";

/// Keeps the telemetry writer alive; dropping it flushes pending filter events.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    pub telemetry_path: PathBuf,
}

/// Routes filter and runner events for one scenario run.
///
/// With `logging.enable_structured`, every event (per-step `info!`, filter `debug!`, collapse
/// `warn!`) is written as one JSON object to `telemetry.jsonl` beside the posterior rows.
/// Otherwise only warnings reach stderr. `RUST_LOG` overrides the level in both cases.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        let _ = fmt()
            .with_env_filter(level_filter(Level::WARN))
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
        return Ok(None);
    }

    let run_dir = outputs
        .jsonl
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("creating run directory {}", run_dir.display()))?;

    let telemetry_path = run_dir.join(TELEMETRY_FILE);
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating filter telemetry {}", telemetry_path.display()))?;

    // Lossless: a dropped step event would leave a gap in the posterior trace.
    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(level_filter(logging.level().unwrap_or(Level::INFO)))
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // Integration tests run several scenarios in one process; the first subscriber wins.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        _guard: guard,
        telemetry_path,
    }))
}

fn level_filter(fallback: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback.as_str()))
}
