//! Shared data models for emoscan.
//!
//! This crate provides Serde-serializable types for:
//! - Facial landmark keypoints and per-frame face observations
//! - Emotion labels, label sets and scored distributions
//! - Session readings and running summaries
//! - Persistence records for detected emotions

pub mod emotion;
pub mod keypoint;
pub mod label_set;
pub mod reading;
pub mod record;

// Re-export common types
pub use emotion::{EmotionDistribution, EmotionLabel, EmotionScore, LabelParseError};
pub use keypoint::{FaceObservation, Keypoint, FACE_MESH_LANDMARKS};
pub use label_set::{LabelSet, LabelSetParseError};
pub use reading::{EmotionReading, SessionId, SessionSummary};
pub use record::{DetectionMethod, EmotionRecord};
