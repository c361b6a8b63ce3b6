//! Error types for detection, scoring and session operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while detecting faces or running a session.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to load face mesh model: {0}")]
    ModelLoad(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Observation is missing keypoints {missing:?}")]
    MalformedObservation { missing: Vec<u32> },

    #[error("Detector is not initialized")]
    DetectorUnavailable,

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Frame source error: {0}")]
    FrameSource(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a model load failure error.
    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create a frame source error.
    pub fn frame_source(message: impl Into<String>) -> Self {
        Self::FrameSource(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::ModelLoad(_) | MediaError::Timeout(_) | MediaError::DetectionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(MediaError::model_load("network").is_retryable());
        assert!(MediaError::Timeout(1500).is_retryable());
        assert!(!MediaError::model_not_found("/tmp/x.onnx").is_retryable());
        assert!(!MediaError::MalformedObservation { missing: vec![13] }.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = MediaError::MalformedObservation {
            missing: vec![61, 291],
        };
        assert_eq!(err.to_string(), "Observation is missing keypoints [61, 291]");
        assert_eq!(
            MediaError::Timeout(250).to_string(),
            "Operation timed out after 250 ms"
        );
    }
}
