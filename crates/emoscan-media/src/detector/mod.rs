//! Face mesh detection.
//!
//! The face mesh model is an external capability behind [`FaceMeshModel`].
//! [`DetectorSlot`] owns the load / teardown lifecycle and hands out
//! reference-counted [`DetectorHandle`]s to analysis sessions.

pub mod face_mesh;
pub mod observations;
pub mod slot;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use emoscan_models::FaceObservation;

use crate::error::MediaResult;

pub use face_mesh::{FaceMeshConfig, OrtFaceMesh, OrtFaceMeshLoader, TensorLayout};
pub use observations::{
    parse_observations, read_observations, RecordedFrame, ReplayFaceMesh, ReplayLoader,
};
pub use slot::{DetectorHandle, DetectorSlot, DetectorState};

/// RGB frame handed to the detector.
pub type Frame = image::RgbImage;

/// Compute backend a model session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeBackend {
    /// NVIDIA GPU via the CUDA execution provider
    Cuda,
    /// Apple Neural Engine / GPU via CoreML
    CoreMl,
    /// CPU fallback
    Cpu,
    /// No real inference (recorded or synthetic models)
    None,
}

impl ComputeBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeBackend::Cuda => "cuda",
            ComputeBackend::CoreMl => "coreml",
            ComputeBackend::Cpu => "cpu",
            ComputeBackend::None => "none",
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, ComputeBackend::Cuda | ComputeBackend::CoreMl)
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Face mesh landmark model.
///
/// Implementations run synchronously; sessions call them from the blocking
/// thread pool.
pub trait FaceMeshModel: Send + Sync {
    /// Detect faces in a frame. An empty vector means no face.
    fn estimate_faces(&self, frame: &Frame) -> MediaResult<Vec<FaceObservation>>;

    /// Model name for logging.
    fn name(&self) -> &'static str;

    /// Backend the model runs on.
    fn backend(&self) -> ComputeBackend;
}

/// Loads a face mesh model. Used by [`DetectorSlot`] on initialize.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> MediaResult<Arc<dyn FaceMeshModel>>;

    /// Loader name for logging.
    fn name(&self) -> &'static str;
}
