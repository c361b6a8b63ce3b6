//! Shared fixtures for emoscan-media integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use emoscan_media::scoring::geometry::*;
use emoscan_media::{ComputeBackend, FaceMeshModel, Frame, MediaError, MediaResult, ModelLoader};
use emoscan_models::{FaceObservation, Keypoint};

/// Observation whose metrics come out exactly as requested (y-up smile sign).
pub fn observation_with(smile: f32, mouth: f32, brow: f32, eye: f32) -> FaceObservation {
    let left_eye_y = 100.0;
    let right_eye_y = left_eye_y + eye;
    let lip_y = 200.0;
    let brow_gap = brow / 2.0;

    FaceObservation::new(vec![
        Keypoint::new(UPPER_LIP, 115.0, lip_y),
        Keypoint::new(LOWER_LIP, 115.0, lip_y + mouth),
        Keypoint::new(LEFT_EYE_OUTER, 60.0, left_eye_y),
        Keypoint::new(MOUTH_LEFT, 85.0, lip_y + smile),
        Keypoint::new(LEFT_BROW, 75.0, left_eye_y - brow_gap),
        Keypoint::new(LEFT_EYE_INNER, 90.0, left_eye_y),
        Keypoint::new(MOUTH_RIGHT, 145.0, lip_y + smile),
        Keypoint::new(RIGHT_EYE_OUTER, 170.0, right_eye_y),
        Keypoint::new(RIGHT_BROW, 155.0, right_eye_y - brow_gap),
        Keypoint::new(RIGHT_EYE_INNER, 140.0, right_eye_y),
    ])
}

pub fn smiling_face() -> FaceObservation {
    observation_with(5.0, 8.0, 25.0, 10.0)
}

/// Returns the same observation for every frame.
pub struct FixedModel {
    pub observation: Option<FaceObservation>,
    pub calls: AtomicUsize,
}

impl FixedModel {
    pub fn new(observation: Option<FaceObservation>) -> Self {
        Self {
            observation,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FaceMeshModel for FixedModel {
    fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.observation.clone().into_iter().collect())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }

    fn backend(&self) -> ComputeBackend {
        ComputeBackend::None
    }
}

/// Blocks the calling thread before answering.
pub struct SlowModel {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl SlowModel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FaceMeshModel for SlowModel {
    fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(vec![smiling_face()])
    }

    fn name(&self) -> &'static str {
        "slow"
    }

    fn backend(&self) -> ComputeBackend {
        ComputeBackend::None
    }
}

/// Fails every inference.
pub struct FailingModel;

impl FaceMeshModel for FailingModel {
    fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        Err(MediaError::detection_failed("tensor shape mismatch"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    fn backend(&self) -> ComputeBackend {
        ComputeBackend::None
    }
}

/// Loader handing out a prepared model.
pub struct StaticLoader {
    pub model: Arc<dyn FaceMeshModel>,
    pub loads: AtomicUsize,
}

impl StaticLoader {
    pub fn new(model: Arc<dyn FaceMeshModel>) -> Self {
        Self {
            model,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelLoader for StaticLoader {
    async fn load(&self) -> MediaResult<Arc<dyn FaceMeshModel>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.model))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Loader whose model file never exists.
pub struct FailingLoader;

#[async_trait]
impl ModelLoader for FailingLoader {
    async fn load(&self) -> MediaResult<Arc<dyn FaceMeshModel>> {
        Err(MediaError::model_not_found("/nonexistent/face_mesh.onnx"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Panics on its first call after `delay`, then sees a smiling face.
pub struct PanicOnceModel {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl PanicOnceModel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FaceMeshModel for PanicOnceModel {
    fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            std::thread::sleep(self.delay);
            panic!("face mesh runtime aborted");
        }
        Ok(vec![smiling_face()])
    }

    fn name(&self) -> &'static str {
        "panic_once"
    }

    fn backend(&self) -> ComputeBackend {
        ComputeBackend::None
    }
}
