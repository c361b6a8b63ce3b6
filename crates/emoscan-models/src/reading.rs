//! Per-tick readings produced by an analysis session.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::{EmotionDistribution, EmotionLabel};

/// Unique identifier for an analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one completed session tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionReading {
    pub session_id: SessionId,
    /// Monotonic per-session counter, starting at 0.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    /// False when the frame had no face and the distribution is the neutral default.
    pub face_detected: bool,
    pub distribution: EmotionDistribution,
}

impl EmotionReading {
    pub fn dominant(&self) -> Option<EmotionLabel> {
        self.distribution.dominant().map(|s| s.label)
    }
}

/// Running tally of readings for a session.
///
/// Counts how often each label was dominant. It does not smooth or weight
/// readings over time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SessionSummary {
    pub readings: u64,
    pub no_face: u64,
    pub dominant_counts: BTreeMap<EmotionLabel, u64>,
}

impl SessionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reading: &EmotionReading) {
        self.readings += 1;
        if !reading.face_detected {
            self.no_face += 1;
            return;
        }
        if let Some(label) = reading.dominant() {
            *self.dominant_counts.entry(label).or_insert(0) += 1;
        }
    }

    /// Most frequent dominant label over readings with a face.
    /// Ties go to the label declared first in [`EmotionLabel`].
    pub fn dominant(&self) -> Option<EmotionLabel> {
        let mut best: Option<(EmotionLabel, u64)> = None;
        for (&label, &count) in &self.dominant_counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best.map(|(label, _)| label)
    }

    /// Share of readings in which a face was detected.
    pub fn face_ratio(&self) -> f64 {
        if self.readings == 0 {
            return 0.0;
        }
        (self.readings - self.no_face) as f64 / self.readings as f64
    }
}
