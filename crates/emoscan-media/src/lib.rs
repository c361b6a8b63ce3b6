//! Facial emotion estimation.
//!
//! This crate provides:
//! - Rule-based scoring of face mesh keypoints into emotion percentages
//! - Face mesh inference on ONNX Runtime with an explicit load / teardown lifecycle
//! - Periodic analysis sessions that sample frames and publish readings
//! - Metrics through the `metrics` facade

pub mod detector;
pub mod error;
pub mod metrics;
pub mod scoring;
pub mod session;

pub use detector::{
    ComputeBackend, DetectorHandle, DetectorSlot, DetectorState, FaceMeshConfig, FaceMeshModel,
    Frame, ModelLoader, OrtFaceMesh, OrtFaceMeshLoader, ReplayFaceMesh, ReplayLoader,
};
pub use error::{MediaError, MediaResult};
pub use scoring::{
    dominant_label, normalize, EmotionScorer, FacialMetrics, RuleTable, ScorerConfig,
    SmileConvention,
};
pub use session::{
    BlankFrameSource, ChannelFrameSource, DirectoryFrameSource, EmotionSession, FrameSource,
    SessionConfig, SessionHandle, SessionOutcome,
};
