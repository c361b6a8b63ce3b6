//! Metrics for scoring, detection and sessions.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_SCORED_TOTAL: &str = "emoscan_frames_scored_total";
    pub const NO_FACE_TOTAL: &str = "emoscan_no_face_total";
    pub const MALFORMED_OBSERVATIONS_TOTAL: &str = "emoscan_malformed_observations_total";
    pub const TICKS_SKIPPED_TOTAL: &str = "emoscan_ticks_skipped_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "emoscan_inference_duration_seconds";
    pub const DETECTOR_LOADS_TOTAL: &str = "emoscan_detector_loads_total";
}

/// Record a scored frame by its dominant label.
pub fn record_frame_scored(dominant: &str) {
    let labels = [("dominant", dominant.to_string())];
    counter!(names::FRAMES_SCORED_TOTAL, &labels).increment(1);
}

pub fn record_no_face() {
    counter!(names::NO_FACE_TOTAL).increment(1);
}

pub fn record_malformed_observation() {
    counter!(names::MALFORMED_OBSERVATIONS_TOTAL).increment(1);
}

/// Record a tick that produced no reading (`in_flight` or `timeout`).
pub fn record_tick_skipped(reason: &'static str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::TICKS_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn record_inference_duration(duration_secs: f64) {
    histogram!(names::INFERENCE_DURATION_SECONDS).record(duration_secs);
}

/// Record a detector load attempt (`ok` or `error`).
pub fn record_detector_load(outcome: &'static str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::DETECTOR_LOADS_TOTAL, &labels).increment(1);
}
