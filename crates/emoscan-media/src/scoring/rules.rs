//! Rule tables for emotion scoring.
//!
//! A table is plain data: base scores per label plus a list of threshold
//! rules over [`FacialMetrics`]. Every rule is evaluated independently, in
//! table order, and all comparisons are strict.
//!
//! # Wellbeing table
//!
//! | Condition | Effect |
//! |---|---|
//! | base | neutral 30 |
//! | `smile_intensity > 2` | happy +40, neutral -20 |
//! | `mouth_openness > 5 && smile_intensity > 0` | happy +20 |
//! | `smile_intensity < -2` | sad +40, neutral -15 |
//! | `brow_tension < 20` | anxious +30, neutral -10 |
//! | `eye_openness > 15` | anxious +20 |
//!
//! # Extended table
//!
//! Seven labels with the same smile rules. Rules that set scores run in
//! table order, so a later `Add` can take neutral below its set value; the
//! table's `floor` of 0 clamps that after the last rule.

use emoscan_models::{EmotionLabel, LabelSet};
use serde::{Deserialize, Serialize};

use super::geometry::{FacialMetrics, Metric};

/// Condition over facial metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// `metric > threshold`
    Above(Metric, f64),
    /// `metric < threshold`
    Below(Metric, f64),
    /// Every inner condition holds.
    All(Vec<Condition>),
}

impl Condition {
    pub fn holds(&self, metrics: &FacialMetrics) -> bool {
        match self {
            Condition::Above(metric, threshold) => metrics.get(*metric) > *threshold,
            Condition::Below(metric, threshold) => metrics.get(*metric) < *threshold,
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(metrics)),
        }
    }
}

/// Score change applied when a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Add(EmotionLabel, f64),
    Set(EmotionLabel, f64),
}

impl Adjustment {
    pub fn label(&self) -> EmotionLabel {
        match self {
            Adjustment::Add(label, _) | Adjustment::Set(label, _) => *label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub name: String,
    pub condition: Condition,
    pub effects: Vec<Adjustment>,
}

impl ScoringRule {
    pub fn new(name: impl Into<String>, condition: Condition, effects: Vec<Adjustment>) -> Self {
        Self {
            name: name.into(),
            condition,
            effects,
        }
    }
}

/// Raw (pre-normalization) scores in label set order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScores {
    entries: Vec<(EmotionLabel, f64)>,
}

impl RawScores {
    pub fn entries(&self) -> &[(EmotionLabel, f64)] {
        &self.entries
    }

    pub fn get(&self, label: EmotionLabel) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    fn apply(&mut self, adjustment: &Adjustment) {
        let label = adjustment.label();
        // Labels outside the set are ignored; validate() reports them up front.
        if let Some((_, value)) = self.entries.iter_mut().find(|(l, _)| *l == label) {
            match adjustment {
                Adjustment::Add(_, delta) => *value += delta,
                Adjustment::Set(_, v) => *value = *v,
            }
        }
    }
}

/// Complete scoring configuration for one label set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub label_set: LabelSet,
    pub base: Vec<(EmotionLabel, f64)>,
    pub rules: Vec<ScoringRule>,
    /// Lowest raw score a label can end at. `None` leaves scores unclamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<f64>,
}

impl RuleTable {
    /// Four-label table used by the patient dashboard.
    pub fn wellbeing() -> Self {
        use Adjustment::Add;
        use EmotionLabel::*;
        use Metric::*;

        Self {
            label_set: LabelSet::Wellbeing,
            base: vec![(Neutral, 30.0)],
            rules: vec![
                ScoringRule::new(
                    "smile",
                    Condition::Above(SmileIntensity, 2.0),
                    vec![Add(Happy, 40.0), Add(Neutral, -20.0)],
                ),
                ScoringRule::new(
                    "open_smile",
                    Condition::All(vec![
                        Condition::Above(MouthOpenness, 5.0),
                        Condition::Above(SmileIntensity, 0.0),
                    ]),
                    vec![Add(Happy, 20.0)],
                ),
                ScoringRule::new(
                    "mouth_corners_down",
                    Condition::Below(SmileIntensity, -2.0),
                    vec![Add(Sad, 40.0), Add(Neutral, -15.0)],
                ),
                ScoringRule::new(
                    "brow_tension",
                    Condition::Below(BrowTension, 20.0),
                    vec![Add(Anxious, 30.0), Add(Neutral, -10.0)],
                ),
                ScoringRule::new(
                    "wide_eyes",
                    Condition::Above(EyeOpenness, 15.0),
                    vec![Add(Anxious, 20.0)],
                ),
            ],
            floor: None,
        }
    }

    /// Seven-label table. Disgust has no rule and always scores 0.
    pub fn extended() -> Self {
        use Adjustment::{Add, Set};
        use EmotionLabel::*;
        use Metric::*;

        Self {
            label_set: LabelSet::Extended,
            base: vec![(Neutral, 50.0)],
            rules: vec![
                ScoringRule::new(
                    "smile",
                    Condition::Above(SmileIntensity, 2.0),
                    vec![Add(Happy, 40.0), Add(Neutral, -20.0)],
                ),
                ScoringRule::new(
                    "open_smile",
                    Condition::All(vec![
                        Condition::Above(MouthOpenness, 5.0),
                        Condition::Above(SmileIntensity, 0.0),
                    ]),
                    vec![Add(Happy, 20.0)],
                ),
                ScoringRule::new(
                    "mouth_corners_down",
                    Condition::Below(SmileIntensity, -2.0),
                    vec![Add(Sad, 40.0), Add(Neutral, -15.0)],
                ),
                ScoringRule::new(
                    "surprise",
                    Condition::All(vec![
                        Condition::Above(EyeOpenness, 15.0),
                        Condition::Above(MouthOpenness, 20.0),
                        Condition::Above(EyeWidth, 20.0),
                    ]),
                    vec![Set(Surprise, 70.0), Set(Neutral, 10.0)],
                ),
                ScoringRule::new(
                    "brow_tension",
                    Condition::Below(BrowTension, 20.0),
                    vec![Add(Fear, 30.0), Add(Neutral, -10.0)],
                ),
                ScoringRule::new(
                    "lowered_brows",
                    Condition::All(vec![
                        Condition::Below(BrowTension, 12.0),
                        Condition::Below(SmileIntensity, 0.0),
                    ]),
                    vec![Add(Angry, 50.0), Add(Neutral, -10.0)],
                ),
                ScoringRule::new(
                    "pursed_lips",
                    Condition::Below(MouthWidth, 5.0),
                    vec![Add(Sad, 20.0), Add(Neutral, -10.0)],
                ),
            ],
            floor: Some(0.0),
        }
    }

    pub fn for_label_set(label_set: LabelSet) -> Self {
        match label_set {
            LabelSet::Wellbeing => Self::wellbeing(),
            LabelSet::Extended => Self::extended(),
        }
    }

    /// Labels referenced by the table that are not part of its label set.
    pub fn validate(&self) -> Vec<EmotionLabel> {
        let mut unknown: Vec<EmotionLabel> = self
            .base
            .iter()
            .map(|(label, _)| *label)
            .chain(
                self.rules
                    .iter()
                    .flat_map(|r| r.effects.iter().map(Adjustment::label)),
            )
            .filter(|label| !self.label_set.contains(*label))
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    /// Evaluate every rule against the metrics.
    pub fn evaluate(&self, metrics: &FacialMetrics) -> RawScores {
        let mut scores = RawScores {
            entries: self
                .label_set
                .labels()
                .iter()
                .map(|&label| (label, 0.0))
                .collect(),
        };
        for (label, value) in &self.base {
            scores.apply(&Adjustment::Set(*label, *value));
        }
        for rule in &self.rules {
            if rule.condition.holds(metrics) {
                for effect in &rule.effects {
                    scores.apply(effect);
                }
            }
        }
        if let Some(floor) = self.floor {
            for (_, value) in &mut scores.entries {
                *value = value.max(floor);
            }
        }
        scores
    }

    /// Names of the rules that fire for the given metrics.
    pub fn fired(&self, metrics: &FacialMetrics) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.condition.holds(metrics))
            .map(|r| r.name.as_str())
            .collect()
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::wellbeing()
    }
}
