//! Rule-based facial emotion scoring.
//!
//! Keypoints are reduced to a handful of geometric metrics, a rule table
//! turns the metrics into raw per-label scores, and normalization converts
//! those into a ranked percentage distribution.

pub mod geometry;
pub mod rules;
pub mod scorer;

pub use geometry::{FacialMetrics, Metric, SmileConvention, REQUIRED_KEYPOINTS};
pub use rules::{Adjustment, Condition, RawScores, RuleTable, ScoringRule};
pub use scorer::{dominant_label, normalize, EmotionScorer, ScorerConfig};
