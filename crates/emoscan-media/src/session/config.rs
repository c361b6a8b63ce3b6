//! Session timing configuration.

use std::time::Duration;

use crate::scoring::ScorerConfig;

/// Default sampling interval between frames.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(700);
/// Default upper bound on one inference call.
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_millis(1500);

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);
const MAX_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for an analysis session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// Time between frame samples.
    pub tick_interval: Duration,
    /// Inference taking longer than this is abandoned for the tick.
    pub inference_timeout: Duration,
    pub scorer: ScorerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            scorer: ScorerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let tick_interval = std::env::var("EMOSCAN_TICK_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TICK_INTERVAL);

        let inference_timeout = std::env::var("EMOSCAN_INFERENCE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&ms: &u64| ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INFERENCE_TIMEOUT);

        Self {
            tick_interval: clamp_tick_interval(tick_interval),
            inference_timeout,
            scorer: ScorerConfig::from_env(),
        }
    }

    /// Set the tick interval, clamped to 100 ms ..= 10 s.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = clamp_tick_interval(interval);
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn with_scorer(mut self, scorer: ScorerConfig) -> Self {
        self.scorer = scorer;
        self
    }
}

fn clamp_tick_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_TICK_INTERVAL, MAX_TICK_INTERVAL)
}
