//! MediaPipe Face Mesh inference on ONNX Runtime.
//!
//! The whole frame is resized to the model input, so landmark coordinates are
//! mapped back with separate x / y scales. Models that emit pixel coordinates
//! in input space and models that emit normalized coordinates are both
//! accepted.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use emoscan_models::{FaceObservation, Keypoint, FACE_MESH_LANDMARKS};
use image::imageops::{self, FilterType};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ComputeBackend, FaceMeshModel, Frame, ModelLoader};
use crate::error::{MediaError, MediaResult};

const DEFAULT_INPUT_SIZE: u32 = 192;

/// Candidate locations searched when no model path is configured.
const DEFAULT_MODEL_PATHS: &[&str] = &[
    "models/face_mesh/face_landmark.onnx",
    "backend/models/face_mesh/face_landmark.onnx",
    "/app/models/face_mesh/face_landmark.onnx",
];

/// Memory layout of the model input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl TensorLayout {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "nchw" | "chw" => Some(Self::Nchw),
            "nhwc" | "hwc" => Some(Self::Nhwc),
            _ => None,
        }
    }
}

/// Face mesh model configuration.
#[derive(Debug, Clone)]
pub struct FaceMeshConfig {
    /// ONNX model file.
    pub model_path: PathBuf,
    /// Square input edge in pixels.
    pub input_size: u32,
    /// Input tensor layout.
    pub layout: TensorLayout,
    /// Scale pixels to [-1, 1] instead of [0, 1].
    pub signed_input: bool,
    /// Minimum face presence score; lower scores report no face.
    pub min_face_presence: f32,
    /// Try GPU execution providers before CPU.
    pub prefer_gpu: bool,
    /// Intra-op thread count (0 lets ONNX Runtime decide).
    pub intra_threads: usize,
}

impl Default for FaceMeshConfig {
    fn default() -> Self {
        Self {
            model_path: find_default_model_path()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATHS[0])),
            input_size: DEFAULT_INPUT_SIZE,
            layout: TensorLayout::default(),
            signed_input: false,
            min_face_presence: 0.5,
            prefer_gpu: true,
            intra_threads: 0,
        }
    }
}

impl FaceMeshConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("EMOSCAN_FACE_MESH_MODEL")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            input_size: std::env::var("EMOSCAN_FACE_MESH_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&s| s > 0)
                .unwrap_or(defaults.input_size),
            layout: std::env::var("EMOSCAN_FACE_MESH_LAYOUT")
                .ok()
                .and_then(|s| TensorLayout::parse(&s))
                .unwrap_or(defaults.layout),
            signed_input: std::env::var("EMOSCAN_FACE_MESH_SIGNED_INPUT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.signed_input),
            min_face_presence: std::env::var("EMOSCAN_MIN_FACE_PRESENCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|p: f32| p.clamp(0.0, 1.0))
                .unwrap_or(defaults.min_face_presence),
            prefer_gpu: std::env::var("EMOSCAN_PREFER_GPU")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.prefer_gpu),
            intra_threads: std::env::var("EMOSCAN_INTRA_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.intra_threads),
        }
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }
}

/// Search the default model locations.
pub fn find_default_model_path() -> Option<PathBuf> {
    DEFAULT_MODEL_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// ONNX Runtime wrapper for the MediaPipe Face Mesh model.
pub struct OrtFaceMesh {
    session: Mutex<Session>,
    backend: ComputeBackend,
    landmarks_output: String,
    presence_output: Option<String>,
    config: FaceMeshConfig,
}

impl OrtFaceMesh {
    /// Load the model synchronously.
    pub fn load(config: FaceMeshConfig) -> MediaResult<Self> {
        if !config.model_path.exists() {
            return Err(MediaError::model_not_found(
                config.model_path.display().to_string(),
            ));
        }

        let (session, backend) = create_session(&config)?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let landmarks_output = output_names
            .first()
            .cloned()
            .ok_or_else(|| MediaError::model_load("Model declares no outputs"))?;
        let presence_output = output_names.get(1).cloned();

        info!(
            model = %config.model_path.display(),
            backend = %backend,
            landmarks_output = %landmarks_output,
            presence_output = ?presence_output,
            "Loaded face mesh model"
        );
        if config.prefer_gpu && !backend.is_accelerated() {
            warn!(backend = %backend, "No GPU execution provider available, inference runs on CPU");
        }

        Ok(Self {
            session: Mutex::new(session),
            backend,
            landmarks_output,
            presence_output,
            config,
        })
    }

    fn preprocess(&self, frame: &Frame) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = imageops::resize(frame, size, size, FilterType::Triangle);
        let (w, h) = (size as usize, size as usize);

        let scale = |v: u8| {
            let v = v as f32 / 255.0;
            if self.config.signed_input {
                v * 2.0 - 1.0
            } else {
                v
            }
        };

        let mut data = Vec::with_capacity(w * h * 3);
        let shape = match self.config.layout {
            TensorLayout::Nchw => {
                for c in 0..3 {
                    for y in 0..h {
                        for x in 0..w {
                            data.push(scale(resized.get_pixel(x as u32, y as u32)[c]));
                        }
                    }
                }
                vec![1usize, 3, h, w]
            }
            TensorLayout::Nhwc => {
                data.extend(resized.as_raw().iter().map(|&v| scale(v)));
                vec![1usize, h, w, 3]
            }
        };

        Tensor::from_array((shape, data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("ORT tensor: {e}")))
    }
}

impl FaceMeshModel for OrtFaceMesh {
    fn estimate_faces(&self, frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(MediaError::detection_failed("Empty frame"));
        }

        let input = self.preprocess(frame)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::detection_failed("ORT session poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ORT run failed: {e}")))?;

        if let Some(name) = &self.presence_output {
            if let Some(value) = outputs.get(name.as_str()) {
                let (_, data) = value
                    .try_extract_tensor::<f32>()
                    .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;
                if let Some(&raw) = data.first() {
                    let presence = face_presence(raw);
                    if presence < self.config.min_face_presence {
                        debug!(presence, "Face presence below threshold");
                        return Ok(Vec::new());
                    }
                }
            }
        }

        let output = outputs
            .get(self.landmarks_output.as_str())
            .ok_or_else(|| MediaError::detection_failed("ORT returned no landmark output"))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("ORT extract: {e}")))?;

        let keypoints = decode_landmarks(
            shape,
            data,
            self.config.input_size as f32,
            frame.width() as f32,
            frame.height() as f32,
        )?;

        Ok(vec![FaceObservation::new(keypoints)])
    }

    fn name(&self) -> &'static str {
        "mediapipe_face_mesh"
    }

    fn backend(&self) -> ComputeBackend {
        self.backend
    }
}

/// Loads [`OrtFaceMesh`] off the async runtime.
#[derive(Debug, Clone)]
pub struct OrtFaceMeshLoader {
    config: FaceMeshConfig,
}

impl OrtFaceMeshLoader {
    pub fn new(config: FaceMeshConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FaceMeshConfig {
        &self.config
    }
}

#[async_trait]
impl ModelLoader for OrtFaceMeshLoader {
    async fn load(&self) -> MediaResult<Arc<dyn FaceMeshModel>> {
        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || OrtFaceMesh::load(config))
            .await
            .map_err(|e| MediaError::model_load(format!("Model load task failed: {e}")))??;
        Ok(Arc::new(model))
    }

    fn name(&self) -> &'static str {
        "onnx_face_mesh"
    }
}

/// Create an ONNX Runtime session, trying accelerated providers first.
fn create_session(config: &FaceMeshConfig) -> MediaResult<(Session, ComputeBackend)> {
    let model_bytes = std::fs::read(&config.model_path)
        .map_err(|e| MediaError::model_load(format!("Failed to read model file: {e}")))?;

    let mut builder = Session::builder()
        .map_err(|e| MediaError::model_load(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::model_load(format!("Failed to set optimization level: {e}")))?;

    if config.intra_threads > 0 {
        builder = builder
            .with_intra_threads(config.intra_threads)
            .map_err(|e| MediaError::model_load(format!("Failed to set intra threads: {e}")))?;
    }

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if config.prefer_gpu {
            if let Ok(cuda_builder) = builder
                .clone()
                .with_execution_providers([CUDAExecutionProvider::default().build()])
            {
                if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                    info!("Using CUDA execution provider for face mesh");
                    return Ok((session, ComputeBackend::Cuda));
                }
            }
            debug!("CUDA execution provider not available, trying alternatives");
        }
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if config.prefer_gpu {
            if let Ok(coreml_builder) = builder
                .clone()
                .with_execution_providers([CoreMLExecutionProvider::default().build()])
            {
                if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                    info!("Using CoreML execution provider for face mesh");
                    return Ok((session, ComputeBackend::CoreMl));
                }
            }
            debug!("CoreML execution provider not available, using CPU");
        }
    }

    info!("Using CPU execution provider for face mesh");
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::model_load(format!("Failed to load ONNX model: {e}")))?;
    Ok((session, ComputeBackend::Cpu))
}

/// Face flag outputs are logits; already-normalized scores pass through.
fn face_presence(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Decode landmark output into frame-space keypoints.
///
/// Accepts `[1, N, D]`, `[N, D]` and flat `[1, 1, 1, N*3]` shapes with `D >= 3`.
fn decode_landmarks(
    shape: &[i64],
    data: &[f32],
    input_size: f32,
    frame_w: f32,
    frame_h: f32,
) -> MediaResult<Vec<Keypoint>> {
    let (points, dim) = match shape {
        [_, .., flat] if shape[..shape.len() - 1].iter().all(|&d| d == 1) && *flat % 3 == 0 => {
            (*flat as usize / 3, 3)
        }
        [1, n, d] => (*n as usize, *d as usize),
        [n, d] => (*n as usize, *d as usize),
        _ => {
            return Err(MediaError::detection_failed(format!(
                "Unexpected face mesh output shape: {shape:?}"
            )))
        }
    };

    if dim < 3 || data.len() < points * dim {
        return Err(MediaError::detection_failed(
            "Face mesh output missing Z channel",
        ));
    }
    if points < FACE_MESH_LANDMARKS {
        return Err(MediaError::detection_failed(format!(
            "Face mesh returned {points} landmarks, expected {FACE_MESH_LANDMARKS}"
        )));
    }

    // Pixel-space outputs exceed the unit square by a wide margin.
    let pixel_space = data
        .chunks(dim)
        .take(points)
        .any(|p| p[0].abs() > 2.0 || p[1].abs() > 2.0);
    let norm = if pixel_space { input_size } else { 1.0 };

    Ok(data
        .chunks(dim)
        .take(points)
        .enumerate()
        .map(|(i, p)| {
            let (x, y) = map_normalized_to_frame(p[0] / norm, p[1] / norm, frame_w, frame_h);
            Keypoint::new(i as u32, x, y).with_z(p[2] / norm * frame_w)
        })
        .collect())
}

/// Map normalized input coordinates back to frame pixels.
#[inline]
pub fn map_normalized_to_frame(nx: f32, ny: f32, frame_w: f32, frame_h: f32) -> (f32, f32) {
    (nx * frame_w, ny * frame_h)
}
