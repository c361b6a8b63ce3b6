//! Emotion labels and scored distributions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::LabelSet;

/// Emotion label produced by the scorer.
///
/// The declaration order is the canonical order used for tie-breaking and
/// for iteration over maps keyed by label.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Happy,
    Neutral,
    Sad,
    Anxious,
    Angry,
    Fear,
    Disgust,
    Surprise,
}

impl EmotionLabel {
    /// All labels known to the system.
    pub const ALL: &'static [EmotionLabel] = &[
        EmotionLabel::Happy,
        EmotionLabel::Neutral,
        EmotionLabel::Sad,
        EmotionLabel::Anxious,
        EmotionLabel::Angry,
        EmotionLabel::Fear,
        EmotionLabel::Disgust,
        EmotionLabel::Surprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Anxious => "anxious",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Surprise => "surprise",
        }
    }

}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Spanish names are what the patient dashboard displays.
        match s.trim().to_lowercase().as_str() {
            "happy" | "feliz" => Ok(EmotionLabel::Happy),
            "neutral" => Ok(EmotionLabel::Neutral),
            "sad" | "triste" => Ok(EmotionLabel::Sad),
            "anxious" | "ansioso" => Ok(EmotionLabel::Anxious),
            "angry" => Ok(EmotionLabel::Angry),
            "fear" | "fearful" => Ok(EmotionLabel::Fear),
            "disgust" | "disgusted" => Ok(EmotionLabel::Disgust),
            "surprise" | "surprised" => Ok(EmotionLabel::Surprise),
            _ => Err(LabelParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown emotion label: {0}")]
pub struct LabelParseError(String);

/// One entry of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EmotionScore {
    pub label: EmotionLabel,
    /// Rounded share of the total score, 0..=100.
    pub percentage: u32,
}

impl EmotionScore {
    pub fn new(label: EmotionLabel, percentage: u32) -> Self {
        Self { label, percentage }
    }
}

/// Ranked distribution over a label set.
///
/// Entries are sorted descending by percentage. Ties keep the order in which
/// the entries were supplied, which callers set to the label set order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct EmotionDistribution(Vec<EmotionScore>);

impl EmotionDistribution {
    /// Build a distribution from scores listed in label set order.
    pub fn from_ordered(mut scores: Vec<EmotionScore>) -> Self {
        // Vec::sort_by is stable, so equal percentages keep their input order.
        scores.sort_by(|a, b| b.percentage.cmp(&a.percentage));
        Self(scores)
    }

    /// The "no signal" distribution: 100% neutral, 0% for every other label.
    pub fn neutral_default(label_set: LabelSet) -> Self {
        let scores = label_set
            .labels()
            .iter()
            .map(|&label| {
                let percentage = if label == EmotionLabel::Neutral { 100 } else { 0 };
                EmotionScore::new(label, percentage)
            })
            .collect();
        Self::from_ordered(scores)
    }

    pub fn scores(&self) -> &[EmotionScore] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmotionScore> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest-ranked entry.
    pub fn dominant(&self) -> Option<&EmotionScore> {
        self.0.first()
    }

    /// Percentage for a label, if the label is part of this distribution.
    pub fn percentage(&self, label: EmotionLabel) -> Option<u32> {
        self.0
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.percentage)
    }

    /// Sum of all percentages. Independent rounding means this can differ
    /// slightly from 100.
    pub fn total(&self) -> u32 {
        self.0.iter().map(|s| s.percentage).sum()
    }

    pub fn is_neutral_default(&self) -> bool {
        self.0.iter().all(|s| {
            if s.label == EmotionLabel::Neutral {
                s.percentage == 100
            } else {
                s.percentage == 0
            }
        })
    }
}

impl<'a> IntoIterator for &'a EmotionDistribution {
    type Item = &'a EmotionScore;
    type IntoIter = std::slice::Iter<'a, EmotionScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
