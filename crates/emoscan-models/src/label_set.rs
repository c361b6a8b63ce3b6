//! Label set definitions.
//!
//! Two label sets are in use:
//!
//! - `Wellbeing`: happy / neutral / sad / anxious (patient dashboard)
//! - `Extended`: happy / sad / angry / neutral / fear / disgust / surprise

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::EmotionLabel;

/// Label set a scorer reports over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelSet {
    /// Four labels tuned for mood tracking.
    #[default]
    Wellbeing,

    /// Seven basic-emotion labels.
    Extended,
}

const WELLBEING_LABELS: &[EmotionLabel] = &[
    EmotionLabel::Happy,
    EmotionLabel::Neutral,
    EmotionLabel::Sad,
    EmotionLabel::Anxious,
];

const EXTENDED_LABELS: &[EmotionLabel] = &[
    EmotionLabel::Happy,
    EmotionLabel::Sad,
    EmotionLabel::Angry,
    EmotionLabel::Neutral,
    EmotionLabel::Fear,
    EmotionLabel::Disgust,
    EmotionLabel::Surprise,
];

impl LabelSet {
    pub const ALL: &'static [LabelSet] = &[LabelSet::Wellbeing, LabelSet::Extended];

    /// Labels in their canonical order. This order breaks percentage ties.
    pub fn labels(&self) -> &'static [EmotionLabel] {
        match self {
            LabelSet::Wellbeing => WELLBEING_LABELS,
            LabelSet::Extended => EXTENDED_LABELS,
        }
    }

    pub fn contains(&self, label: EmotionLabel) -> bool {
        self.labels().contains(&label)
    }

    /// Position of a label in the canonical order.
    pub fn position(&self, label: EmotionLabel) -> Option<usize> {
        self.labels().iter().position(|&l| l == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSet::Wellbeing => "wellbeing",
            LabelSet::Extended => "extended",
        }
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LabelSet {
    type Err = LabelSetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wellbeing" | "basic" | "4" => Ok(LabelSet::Wellbeing),
            "extended" | "full" | "7" => Ok(LabelSet::Extended),
            _ => Err(LabelSetParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown label set: {0}")]
pub struct LabelSetParseError(String);
