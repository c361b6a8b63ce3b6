//! Headless facial emotion analysis worker.
//!
//! This crate provides:
//! - Environment-driven configuration
//! - Live mode: image frames → face mesh → scorer, on the session timer
//! - Replay mode: recorded observations → scorer
//! - JSON Lines output of readings or persistence records

pub mod config;
pub mod error;
pub mod live;
pub mod output;
pub mod replay;

pub use config::{RunMode, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use output::ReadingWriter;

use emoscan_models::SessionSummary;
use tokio::sync::watch;
use tracing::info;

/// Run the worker in its configured mode until the input ends or `shutdown` flips.
pub async fn run(config: &WorkerConfig, shutdown: watch::Receiver<bool>) -> WorkerResult<SessionSummary> {
    config.validate()?;
    let mut writer =
        ReadingWriter::open(config.output_path.as_deref(), config.patient_id.clone()).await?;

    let summary = match config.mode {
        RunMode::Live => {
            let outcome = live::run_live(config, &mut writer, shutdown).await?;
            info!(
                ticks = outcome.ticks,
                skipped = outcome.skipped,
                timeouts = outcome.timeouts,
                failures = outcome.failures,
                "Live session finished"
            );
            outcome.summary
        }
        RunMode::Replay => {
            let path = config
                .observations_path
                .as_deref()
                .ok_or_else(|| WorkerError::config_error("EMOSCAN_OBSERVATIONS_PATH is not set"))?;
            replay::replay(path, config.session.scorer, &mut writer, &shutdown).await?
        }
    };

    let lines = writer.finish().await?;
    info!(
        mode = config.mode.as_str(),
        lines,
        readings = summary.readings,
        face_ratio = summary.face_ratio(),
        dominant = ?summary.dominant(),
        "Worker run complete"
    );
    Ok(summary)
}
