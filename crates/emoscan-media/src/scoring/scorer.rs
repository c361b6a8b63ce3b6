//! Emotion scorer: face observation in, ranked distribution out.

use emoscan_models::{EmotionDistribution, EmotionLabel, EmotionScore, FaceObservation, LabelSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::geometry::{FacialMetrics, SmileConvention};
use super::rules::{RawScores, RuleTable};
use crate::error::MediaError;
use crate::metrics;

/// Scorer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub label_set: LabelSet,
    pub smile_convention: SmileConvention,
}

impl ScorerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            label_set: std::env::var("EMOSCAN_LABEL_SET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            smile_convention: std::env::var("EMOSCAN_SMILE_CONVENTION")
                .ok()
                .and_then(|s| SmileConvention::parse(&s))
                .unwrap_or_default(),
        }
    }
}

/// Stateless, rule-table driven emotion scorer.
///
/// Safe to share between sessions; scoring never mutates the scorer.
#[derive(Debug, Clone)]
pub struct EmotionScorer {
    table: RuleTable,
    convention: SmileConvention,
}

impl EmotionScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            table: RuleTable::for_label_set(config.label_set),
            convention: config.smile_convention,
        }
    }

    /// Build a scorer around a custom table.
    pub fn with_table(table: RuleTable, convention: SmileConvention) -> Self {
        let unknown = table.validate();
        if !unknown.is_empty() {
            warn!(
                label_set = %table.label_set,
                ?unknown,
                "Rule table references labels outside its label set; they will be ignored"
            );
        }
        Self { table, convention }
    }

    pub fn label_set(&self) -> LabelSet {
        self.table.label_set
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// Score one frame. `None` means no face was detected.
    ///
    /// Malformed observations degrade to the neutral default.
    pub fn score(&self, observation: Option<&FaceObservation>) -> EmotionDistribution {
        let Some(observation) = observation else {
            return EmotionDistribution::neutral_default(self.label_set());
        };

        match FacialMetrics::from_observation(observation, self.convention) {
            Ok(m) => self.score_metrics(&m),
            Err(MediaError::MalformedObservation { missing }) => {
                warn!(
                    ?missing,
                    keypoints = observation.len(),
                    "Observation missing required keypoints, using neutral default"
                );
                metrics::record_malformed_observation();
                EmotionDistribution::neutral_default(self.label_set())
            }
            Err(e) => {
                warn!("Failed to compute facial metrics: {}", e);
                EmotionDistribution::neutral_default(self.label_set())
            }
        }
    }

    /// Score precomputed metrics.
    pub fn score_metrics(&self, facial: &FacialMetrics) -> EmotionDistribution {
        let raw = self.table.evaluate(facial);
        debug!(
            smile = facial.smile_intensity,
            mouth = facial.mouth_openness,
            brow = facial.brow_tension,
            eye = facial.eye_openness,
            fired = ?self.table.fired(facial),
            "Scored facial metrics"
        );
        normalize(&raw, self.label_set())
    }
}

impl Default for EmotionScorer {
    fn default() -> Self {
        Self::new(ScorerConfig::default())
    }
}

/// Convert raw scores into rounded percentages.
///
/// Each label is rounded on its own (half up), so with non-negative raw
/// scores the percentages can miss 100 by up to half the number of labels.
/// A non-positive total yields the neutral default. Negative shares are
/// floored at 0, which raises the total by the dropped amount; the built-in
/// tables never produce them.
pub fn normalize(raw: &RawScores, label_set: LabelSet) -> EmotionDistribution {
    let total = raw.total();
    if total <= 0.0 || !total.is_finite() {
        return EmotionDistribution::neutral_default(label_set);
    }

    let scores = raw
        .entries()
        .iter()
        .map(|&(label, value)| EmotionScore::new(label, percentage(value, total)))
        .collect();
    EmotionDistribution::from_ordered(scores)
}

fn percentage(value: f64, total: f64) -> u32 {
    let pct = (value / total * 100.0 + 0.5).floor();
    if pct <= 0.0 {
        0
    } else {
        pct as u32
    }
}

/// Convenience for callers that only need the top label.
pub fn dominant_label(distribution: &EmotionDistribution) -> EmotionLabel {
    distribution
        .dominant()
        .map(|s| s.label)
        .unwrap_or(EmotionLabel::Neutral)
}

#[cfg(test)]
mod tests {
    use super::super::geometry::fixtures::observation_with;
    use super::*;

    fn pct(dist: &EmotionDistribution, label: EmotionLabel) -> u32 {
        dist.percentage(label).unwrap()
    }

    #[test]
    fn test_no_face_is_neutral_default() {
        let dist = EmotionScorer::default().score(None);
        assert_eq!(
            dist.scores(),
            &[
                EmotionScore::new(EmotionLabel::Neutral, 100),
                EmotionScore::new(EmotionLabel::Happy, 0),
                EmotionScore::new(EmotionLabel::Sad, 0),
                EmotionScore::new(EmotionLabel::Anxious, 0),
            ]
        );
    }

    #[test]
    fn test_no_face_extended_default() {
        let scorer = EmotionScorer::new(ScorerConfig {
            label_set: LabelSet::Extended,
            ..ScorerConfig::default()
        });
        let dist = scorer.score(None);
        assert_eq!(dist.len(), 7);
        assert!(dist.is_neutral_default());
    }

    #[test]
    fn test_neutral_face() {
        let obs = observation_with(0.0, 0.0, 25.0, 10.0);
        let dist = EmotionScorer::default().score(Some(&obs));
        assert_eq!(dominant_label(&dist), EmotionLabel::Neutral);
        assert_eq!(pct(&dist, EmotionLabel::Neutral), 100);
        assert_eq!(pct(&dist, EmotionLabel::Happy), 0);
        assert_eq!(pct(&dist, EmotionLabel::Sad), 0);
        assert_eq!(pct(&dist, EmotionLabel::Anxious), 0);
    }

    #[test]
    fn test_smiling_face() {
        let obs = observation_with(5.0, 8.0, 25.0, 10.0);
        let dist = EmotionScorer::default().score(Some(&obs));
        assert_eq!(dominant_label(&dist), EmotionLabel::Happy);
        assert_eq!(pct(&dist, EmotionLabel::Happy), 86);
        assert_eq!(pct(&dist, EmotionLabel::Neutral), 14);
        assert_eq!(pct(&dist, EmotionLabel::Sad), 0);
        assert_eq!(pct(&dist, EmotionLabel::Anxious), 0);
    }

    #[test]
    fn test_smile_threshold_is_strict() {
        let scorer = EmotionScorer::default();
        let at = scorer.score(Some(&observation_with(2.0, 0.0, 25.0, 10.0)));
        assert_eq!(pct(&at, EmotionLabel::Happy), 0);
        assert_eq!(pct(&at, EmotionLabel::Neutral), 100);

        let above = scorer.score(Some(&observation_with(2.0001, 0.0, 25.0, 10.0)));
        // happy 40, neutral 10 -> 80 / 20
        assert_eq!(pct(&above, EmotionLabel::Happy), 80);
        assert_eq!(pct(&above, EmotionLabel::Neutral), 20);
    }

    #[test]
    fn test_sad_face() {
        let obs = observation_with(-4.0, 0.0, 25.0, 10.0);
        let dist = EmotionScorer::default().score(Some(&obs));
        // sad 40, neutral 15
        assert_eq!(dominant_label(&dist), EmotionLabel::Sad);
        assert_eq!(pct(&dist, EmotionLabel::Sad), 73);
        assert_eq!(pct(&dist, EmotionLabel::Neutral), 27);
    }

    #[test]
    fn test_center_minus_corner_reads_lifted_corners_as_smile() {
        // Corners 4px above the lip centre in a y-down frame.
        let obs = observation_with(-4.0, 0.0, 25.0, 10.0);
        let scorer = EmotionScorer::new(ScorerConfig {
            smile_convention: SmileConvention::CenterMinusCorner,
            ..ScorerConfig::default()
        });
        let dist = scorer.score(Some(&obs));
        assert_eq!(dominant_label(&dist), EmotionLabel::Happy);
    }

    #[test]
    fn test_malformed_observation_falls_back() {
        let mut obs = observation_with(5.0, 8.0, 25.0, 10.0);
        obs.keypoints.truncate(3);
        let dist = EmotionScorer::default().score(Some(&obs));
        assert!(dist.is_neutral_default());
    }

    #[test]
    fn test_score_is_idempotent() {
        let scorer = EmotionScorer::default();
        let obs = observation_with(3.0, 6.0, 12.0, 18.0);
        assert_eq!(scorer.score(Some(&obs)), scorer.score(Some(&obs)));
    }

    #[test]
    fn test_percentages_sorted_descending() {
        let scorer = EmotionScorer::default();
        for obs in [
            observation_with(3.0, 6.0, 12.0, 18.0),
            observation_with(-3.0, 1.0, 30.0, 2.0),
            observation_with(0.5, 9.0, 5.0, 16.0),
        ] {
            let dist = scorer.score(Some(&obs));
            let values: Vec<u32> = dist.iter().map(|s| s.percentage).collect();
            assert!(values.windows(2).all(|w| w[0] >= w[1]), "{values:?}");
            assert!(values.iter().all(|&v| v <= 100));
        }
    }

    #[test]
    fn test_ties_follow_label_set_order() {
        // smile 3 / mouth 6: happy 60, neutral 10; brow 10: anxious 30, neutral 0;
        // eye 20: anxious 50. Nothing ties at the top, but sad and neutral both 0.
        let dist = EmotionScorer::default().score(Some(&observation_with(3.0, 6.0, 10.0, 20.0)));
        let labels: Vec<_> = dist.iter().map(|s| s.label).collect();
        assert_eq!(
            labels,
            vec![
                EmotionLabel::Happy,
                EmotionLabel::Anxious,
                EmotionLabel::Neutral,
                EmotionLabel::Sad
            ]
        );
    }
}
