//! Detector lifecycle.
//!
//! A [`DetectorSlot`] holds at most one loaded model. Initialization is
//! serialized and idempotent: concurrent callers wait for the same load and
//! receive handles to the same instance. A failed load leaves the slot in
//! [`DetectorState::Failed`] and the next call retries. Teardown empties the
//! slot; handles already given out keep their model alive until dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use emoscan_models::FaceObservation;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{ComputeBackend, FaceMeshModel, Frame, ModelLoader};
use crate::error::{MediaError, MediaResult};
use crate::metrics;

/// Observable lifecycle state of a [`DetectorSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Uninitialized,
    Ready,
    Failed,
}

enum SlotState {
    Uninitialized,
    Ready(DetectorHandle),
    Failed(String),
}

/// Shared, cheaply cloneable reference to a loaded model.
#[derive(Clone)]
pub struct DetectorHandle {
    model: Arc<dyn FaceMeshModel>,
    generation: u64,
}

impl DetectorHandle {
    /// Wrap a model directly, bypassing a slot.
    pub fn new(model: Arc<dyn FaceMeshModel>) -> Self {
        Self {
            model,
            generation: 0,
        }
    }

    /// Run the model and keep the first face.
    pub fn estimate_faces(&self, frame: &Frame) -> MediaResult<Option<FaceObservation>> {
        let faces = self.model.estimate_faces(frame)?;
        Ok(faces.into_iter().next())
    }

    pub fn model_name(&self) -> &'static str {
        self.model.name()
    }

    pub fn backend(&self) -> ComputeBackend {
        self.model.backend()
    }

    /// Load counter value this handle was created under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of live references to the underlying model.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.model)
    }

    /// Whether two handles point at the same loaded model.
    pub fn same_model(&self, other: &DetectorHandle) -> bool {
        Arc::ptr_eq(&self.model, &other.model)
    }
}

impl fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("model", &self.model.name())
            .field("backend", &self.model.backend())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Owner of the face mesh model lifecycle.
pub struct DetectorSlot {
    loader: Arc<dyn ModelLoader>,
    state: RwLock<SlotState>,
    init_lock: Mutex<()>,
    loads: AtomicU64,
}

impl DetectorSlot {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            state: RwLock::new(SlotState::Uninitialized),
            init_lock: Mutex::new(()),
            loads: AtomicU64::new(0),
        }
    }

    /// Load the model if it is not loaded yet and return a handle to it.
    pub async fn initialize(&self) -> MediaResult<DetectorHandle> {
        if let Some(handle) = self.handle() {
            return Ok(handle);
        }

        let _guard = self.init_lock.lock().await;

        // Another caller may have finished loading while we waited.
        if let Some(handle) = self.handle() {
            return Ok(handle);
        }

        info!(loader = self.loader.name(), "Loading face mesh model");
        match self.loader.load().await {
            Ok(model) => {
                let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
                let handle = DetectorHandle { model, generation };
                info!(
                    model = handle.model_name(),
                    backend = %handle.backend(),
                    generation,
                    "Face mesh model ready"
                );
                metrics::record_detector_load("ok");
                *self.write_state() = SlotState::Ready(handle.clone());
                Ok(handle)
            }
            Err(e) => {
                warn!(loader = self.loader.name(), "Face mesh model failed to load: {}", e);
                metrics::record_detector_load("error");
                *self.write_state() = SlotState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Handle to the loaded model, if any.
    pub fn handle(&self) -> Option<DetectorHandle> {
        match &*self.read_state() {
            SlotState::Ready(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Handle to the loaded model or [`MediaError::DetectorUnavailable`].
    pub fn require(&self) -> MediaResult<DetectorHandle> {
        self.handle().ok_or(MediaError::DetectorUnavailable)
    }

    pub fn state(&self) -> DetectorState {
        match &*self.read_state() {
            SlotState::Uninitialized => DetectorState::Uninitialized,
            SlotState::Ready(_) => DetectorState::Ready,
            SlotState::Failed(_) => DetectorState::Failed,
        }
    }

    /// Message of the last failed load, if the slot is in the failed state.
    pub fn last_error(&self) -> Option<String> {
        match &*self.read_state() {
            SlotState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Detect the first face in a frame.
    ///
    /// Returns `None` when the slot holds no model, when no face is found
    /// and when inference fails; failures are logged.
    pub fn estimate_faces(&self, frame: &Frame) -> Option<FaceObservation> {
        let Some(handle) = self.handle() else {
            debug!("Face detection requested before the detector was initialized");
            return None;
        };
        match handle.estimate_faces(frame) {
            Ok(observation) => observation,
            Err(e) => {
                warn!("Face detection failed: {}", e);
                None
            }
        }
    }

    /// Drop the slot's reference to the model.
    ///
    /// Returns true if a loaded model was released. Outstanding handles stay
    /// valid; the model is freed when the last one is dropped.
    pub fn teardown(&self) -> bool {
        let previous = std::mem::replace(&mut *self.write_state(), SlotState::Uninitialized);
        match previous {
            SlotState::Ready(handle) => {
                // The slot's own clone goes away with `handle`.
                let outstanding = handle.ref_count().saturating_sub(1);
                info!(
                    model = handle.model_name(),
                    generation = handle.generation,
                    outstanding,
                    "Face mesh model released"
                );
                true
            }
            _ => false,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, SlotState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, SlotState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for DetectorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorSlot")
            .field("loader", &self.loader.name())
            .field("state", &self.state())
            .finish()
    }
}
