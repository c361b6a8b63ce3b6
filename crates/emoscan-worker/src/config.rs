//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use emoscan_media::{FaceMeshConfig, SessionConfig};

use crate::error::{WorkerError, WorkerResult};

/// What the worker feeds the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Image frames through the face mesh model.
    #[default]
    Live,
    /// Recorded face observations, scored directly.
    Replay,
}

impl RunMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" | "frames" => Some(Self::Live),
            "replay" | "observations" => Some(Self::Replay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Live => "live",
            RunMode::Replay => "replay",
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub mode: RunMode,
    /// Directory of image frames (live mode)
    pub frames_dir: Option<PathBuf>,
    /// Restart from the first frame when the directory is exhausted
    pub loop_frames: bool,
    /// JSON Lines observation recording (replay mode)
    pub observations_path: Option<PathBuf>,
    /// Output file; stdout when unset
    pub output_path: Option<PathBuf>,
    /// When set, emit persistence records for this patient instead of raw readings
    pub patient_id: Option<String>,
    /// Stop a live session after this long
    pub max_duration: Option<Duration>,
    /// Prometheus scrape endpoint
    pub metrics_addr: Option<SocketAddr>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    pub session: SessionConfig,
    pub face_mesh: FaceMeshConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            frames_dir: None,
            loop_frames: false,
            observations_path: None,
            output_path: None,
            patient_id: None,
            max_duration: None,
            metrics_addr: None,
            shutdown_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
            face_mesh: FaceMeshConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            mode: std::env::var("EMOSCAN_MODE")
                .ok()
                .and_then(|s| RunMode::parse(&s))
                .unwrap_or_default(),
            frames_dir: env_path("EMOSCAN_FRAMES_DIR"),
            loop_frames: std::env::var("EMOSCAN_LOOP_FRAMES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            observations_path: env_path("EMOSCAN_OBSERVATIONS_PATH"),
            output_path: env_path("EMOSCAN_OUTPUT_PATH"),
            patient_id: std::env::var("EMOSCAN_PATIENT_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            max_duration: std::env::var("EMOSCAN_MAX_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .map(Duration::from_secs),
            metrics_addr: std::env::var("EMOSCAN_METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            shutdown_timeout: Duration::from_secs(
                std::env::var("EMOSCAN_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            session: SessionConfig::from_env(),
            face_mesh: FaceMeshConfig::from_env(),
        }
    }

    /// Check that the selected mode has its input configured.
    pub fn validate(&self) -> WorkerResult<()> {
        match self.mode {
            RunMode::Live if self.frames_dir.is_none() => Err(WorkerError::config_error(
                "EMOSCAN_FRAMES_DIR is required in live mode",
            )),
            RunMode::Replay if self.observations_path.is_none() => Err(WorkerError::config_error(
                "EMOSCAN_OBSERVATIONS_PATH is required in replay mode",
            )),
            _ => Ok(()),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
