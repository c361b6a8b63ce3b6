//! Structured logging scoped to one analysis session.

use emoscan_models::SessionId;
use tracing::{error, info, warn};

/// Logger that stamps every event with the session and frame source.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    source: String,
}

impl SessionLogger {
    pub fn new(session_id: &SessionId, source: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            source: source.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            source = %self.source,
            "Session started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            source = %self.source,
            "Session progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            source = %self.source,
            "Session warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            source = %self.source,
            "Session error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            source = %self.source,
            "Session completed: {}", message
        );
    }
}
