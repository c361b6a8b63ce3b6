//! Recorded face observations.
//!
//! A recording is JSON Lines: one [`FaceObservation`] object per frame, or
//! `null` for a frame without a face. Blank lines and lines starting with `#`
//! are skipped. [`ReplayFaceMesh`] plays a recording back through the normal
//! detector path.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use emoscan_models::FaceObservation;
use tracing::info;

use super::{ComputeBackend, FaceMeshModel, Frame, ModelLoader};
use crate::error::{MediaError, MediaResult};

/// One recorded frame; `None` means no face.
pub type RecordedFrame = Option<FaceObservation>;

/// Parse a recording from any buffered reader.
pub fn parse_observations<R: BufRead>(reader: R) -> MediaResult<Vec<RecordedFrame>> {
    let mut frames = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(trimmed).map_err(|e| {
            MediaError::frame_source(format!("Invalid observation on line {}: {e}", line_no + 1))
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Read a recording from disk.
pub fn read_observations(path: &Path) -> MediaResult<Vec<RecordedFrame>> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    parse_observations(std::io::BufReader::new(file))
}

/// Face mesh model that returns recorded observations in order.
///
/// Frame contents are ignored. Once the recording is exhausted every call
/// reports no face.
pub struct ReplayFaceMesh {
    frames: Vec<RecordedFrame>,
    cursor: AtomicUsize,
}

impl ReplayFaceMesh {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Recorded frames not yet played back.
    pub fn remaining(&self) -> usize {
        self.frames
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }
}

impl FaceMeshModel for ReplayFaceMesh {
    fn estimate_faces(&self, _frame: &Frame) -> MediaResult<Vec<FaceObservation>> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .frames
            .get(idx)
            .cloned()
            .flatten()
            .into_iter()
            .collect())
    }

    fn name(&self) -> &'static str {
        "replay"
    }

    fn backend(&self) -> ComputeBackend {
        ComputeBackend::None
    }
}

/// Loads a [`ReplayFaceMesh`] from a recording file.
#[derive(Debug, Clone)]
pub struct ReplayLoader {
    path: PathBuf,
}

impl ReplayLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelLoader for ReplayLoader {
    async fn load(&self) -> MediaResult<Arc<dyn FaceMeshModel>> {
        let path = self.path.clone();
        let frames = tokio::task::spawn_blocking(move || read_observations(&path))
            .await
            .map_err(|e| MediaError::internal(format!("Recording load task failed: {e}")))??;
        info!(path = %self.path.display(), frames = frames.len(), "Loaded observation recording");
        Ok(Arc::new(ReplayFaceMesh::new(frames)))
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}
