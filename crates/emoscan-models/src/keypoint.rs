//! Facial landmark keypoints and per-frame face observations.
//!
//! Keypoint indices follow the 468-point MediaPipe face mesh topology.
//! Coordinates are frame pixels with y growing downward unless the producer
//! documents otherwise.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of landmarks in the face mesh topology.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Single facial landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Keypoint {
    /// Landmark index in the face mesh topology.
    pub index: u32,
    pub x: f32,
    pub y: f32,
    /// Relative depth, when the model provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

impl Keypoint {
    pub fn new(index: u32, x: f32, y: f32) -> Self {
        Self { index, x, y, z: None }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance in the image plane.
    pub fn distance_to(&self, other: &Keypoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// One detected face and its keypoints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct FaceObservation {
    pub keypoints: Vec<Keypoint>,
    /// Face presence confidence reported by the model, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<f32>,
}

impl FaceObservation {
    pub fn new(keypoints: Vec<Keypoint>) -> Self {
        Self {
            keypoints,
            presence: None,
        }
    }

    /// Build an observation from points listed in index order.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let keypoints = points
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| Keypoint::new(i as u32, x, y))
            .collect();
        Self::new(keypoints)
    }

    pub fn with_presence(mut self, presence: f32) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Look up a keypoint by landmark index.
    pub fn keypoint(&self, index: u32) -> Option<&Keypoint> {
        // Model output is dense and index-ordered; sparse sets fall back to a scan.
        match self.keypoints.get(index as usize) {
            Some(kp) if kp.index == index => Some(kp),
            _ => self.keypoints.iter().find(|kp| kp.index == index),
        }
    }

    /// Indices from `required` that are absent or carry non-finite coordinates.
    pub fn missing(&self, required: &[u32]) -> Vec<u32> {
        required
            .iter()
            .copied()
            .filter(|&idx| !self.keypoint(idx).is_some_and(Keypoint::is_finite))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
