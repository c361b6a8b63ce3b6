//! Persistence payload for a detected emotion.
//!
//! Mirrors the emotion record stored by the platform API. Building the
//! payload lives here; sending it is the caller's job.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{EmotionDistribution, EmotionLabel, SessionId};

/// How an emotion was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    TextAnalysis,
    #[default]
    FacialRecognition,
    VoiceAnalysis,
    SelfReported,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::TextAnalysis => "text_analysis",
            DetectionMethod::FacialRecognition => "facial_recognition",
            DetectionMethod::VoiceAnalysis => "voice_analysis",
            DetectionMethod::SelfReported => "self_reported",
        }
    }
}

/// Emotion record as persisted by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRecord {
    pub id: String,
    #[validate(length(min = 1))]
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub emotion_type: EmotionLabel,
    /// 1 (barely present) to 10 (fully dominant).
    #[validate(range(min = 1, max = 10))]
    pub intensity: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence: Option<f32>,
    pub detection_method: DetectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub distribution: EmotionDistribution,
}

impl EmotionRecord {
    /// Build a record from the dominant entry of a distribution.
    ///
    /// Returns `None` for an empty distribution.
    pub fn from_distribution(
        patient_id: impl Into<String>,
        session_id: Option<&SessionId>,
        distribution: EmotionDistribution,
        detection_method: DetectionMethod,
    ) -> Option<Self> {
        let dominant = *distribution.dominant()?;
        Some(Self {
            id: Uuid::new_v4().to_string(),
            patient_id: patient_id.into(),
            session_id: session_id.map(|s| s.to_string()),
            timestamp: Utc::now(),
            emotion_type: dominant.label,
            intensity: intensity_from_percentage(dominant.percentage),
            confidence: Some((dominant.percentage.min(100) as f32) / 100.0),
            detection_method,
            context: None,
            distribution,
        })
    }
}

/// Map a 0..=100 percentage onto the 1..=10 intensity scale.
pub fn intensity_from_percentage(percentage: u32) -> u8 {
    percentage.div_ceil(10).clamp(1, 10) as u8
}
