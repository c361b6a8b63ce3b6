//! Geometric facial metrics derived from face mesh keypoints.
//!
//! # Landmarks (MediaPipe 468-point mesh)
//!
//! - 33 / 133: left eye outer / inner corner
//! - 263 / 362: right eye outer / inner corner
//! - 13 / 14: upper / lower inner lip centre
//! - 61 / 291: left / right mouth corner
//! - 70 / 300: left / right eyebrow

use emoscan_models::{FaceObservation, Keypoint};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MediaError, MediaResult};

pub const LEFT_EYE_OUTER: u32 = 33;
pub const LEFT_EYE_INNER: u32 = 133;
pub const RIGHT_EYE_OUTER: u32 = 263;
pub const RIGHT_EYE_INNER: u32 = 362;
pub const UPPER_LIP: u32 = 13;
pub const LOWER_LIP: u32 = 14;
pub const MOUTH_LEFT: u32 = 61;
pub const MOUTH_RIGHT: u32 = 291;
pub const LEFT_BROW: u32 = 70;
pub const RIGHT_BROW: u32 = 300;

/// Every landmark the metrics read.
pub const REQUIRED_KEYPOINTS: &[u32] = &[
    LEFT_EYE_OUTER,
    LEFT_EYE_INNER,
    RIGHT_EYE_OUTER,
    RIGHT_EYE_INNER,
    UPPER_LIP,
    LOWER_LIP,
    MOUTH_LEFT,
    MOUTH_RIGHT,
    LEFT_BROW,
    RIGHT_BROW,
];

/// Sign convention for smile intensity.
///
/// `CornerMinusCenter` computes `avg(corner y) - centre y`. With y growing
/// downward a lifted corner yields a negative value, so this convention only
/// reads smiles as positive for producers whose y axis grows upward.
/// `CenterMinusCorner` flips the sign for y-down producers. Which one matches
/// a given model has to be settled by calibrating against labelled images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmileConvention {
    #[default]
    CornerMinusCenter,
    CenterMinusCorner,
}

impl SmileConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmileConvention::CornerMinusCenter => "corner_minus_center",
            SmileConvention::CenterMinusCorner => "center_minus_corner",
        }
    }

    /// Parse from environment variable or string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "corner_minus_center" | "y_up" | "up" => Some(Self::CornerMinusCenter),
            "center_minus_corner" | "y_down" | "down" => Some(Self::CenterMinusCorner),
            _ => None,
        }
    }
}

impl fmt::Display for SmileConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SmileConvention {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| MediaError::internal(format!("Unknown smile convention: {s}")))
    }
}

/// Named metric a scoring rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    EyeOpenness,
    MouthOpenness,
    SmileIntensity,
    BrowTension,
    MouthWidth,
    EyeWidth,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::EyeOpenness => "eye_openness",
            Metric::MouthOpenness => "mouth_openness",
            Metric::SmileIntensity => "smile_intensity",
            Metric::BrowTension => "brow_tension",
            Metric::MouthWidth => "mouth_width",
            Metric::EyeWidth => "eye_width",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Facial metrics for one observation, in the observation's coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FacialMetrics {
    /// Vertical gap between the averaged left-eye and right-eye heights.
    pub eye_openness: f64,
    /// Vertical gap between upper and lower lip.
    pub mouth_openness: f64,
    /// Mouth corner height relative to the mouth centre, signed per [`SmileConvention`].
    pub smile_intensity: f64,
    /// Summed vertical gaps between each eyebrow and its eye.
    pub brow_tension: f64,
    /// Distance between the mouth corners.
    pub mouth_width: f64,
    /// Distance between the left eye corners.
    pub eye_width: f64,
}

impl FacialMetrics {
    /// Compute metrics from an observation.
    ///
    /// Fails with [`MediaError::MalformedObservation`] when a required
    /// keypoint is absent or has non-finite coordinates.
    pub fn from_observation(
        observation: &FaceObservation,
        convention: SmileConvention,
    ) -> MediaResult<Self> {
        let missing = observation.missing(REQUIRED_KEYPOINTS);
        if !missing.is_empty() {
            return Err(MediaError::MalformedObservation { missing });
        }

        let kp = |idx: u32| point(observation, idx);
        let y = |idx: u32| point(observation, idx).map(|k| k.y as f64);

        let left_eye_y = (y(LEFT_EYE_OUTER)? + y(LEFT_EYE_INNER)?) / 2.0;
        let right_eye_y = (y(RIGHT_EYE_OUTER)? + y(RIGHT_EYE_INNER)?) / 2.0;
        let mouth_center_y = y(UPPER_LIP)?;
        let corners_y = (y(MOUTH_LEFT)? + y(MOUTH_RIGHT)?) / 2.0;

        let smile = corners_y - mouth_center_y;
        let smile_intensity = match convention {
            SmileConvention::CornerMinusCenter => smile,
            SmileConvention::CenterMinusCorner => -smile,
        };

        Ok(Self {
            eye_openness: (left_eye_y - right_eye_y).abs(),
            mouth_openness: (y(LOWER_LIP)? - mouth_center_y).abs(),
            smile_intensity,
            brow_tension: (y(LEFT_BROW)? - left_eye_y).abs() + (y(RIGHT_BROW)? - right_eye_y).abs(),
            mouth_width: kp(MOUTH_LEFT)?.distance_to(kp(MOUTH_RIGHT)?) as f64,
            eye_width: kp(LEFT_EYE_OUTER)?.distance_to(kp(LEFT_EYE_INNER)?) as f64,
        })
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::EyeOpenness => self.eye_openness,
            Metric::MouthOpenness => self.mouth_openness,
            Metric::SmileIntensity => self.smile_intensity,
            Metric::BrowTension => self.brow_tension,
            Metric::MouthWidth => self.mouth_width,
            Metric::EyeWidth => self.eye_width,
        }
    }
}

fn point(observation: &FaceObservation, idx: u32) -> MediaResult<&Keypoint> {
    observation
        .keypoint(idx)
        .ok_or(MediaError::MalformedObservation { missing: vec![idx] })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use emoscan_models::{FaceObservation, Keypoint};

    use super::*;

    /// Build an observation whose metrics come out exactly as requested
    /// under [`SmileConvention::CornerMinusCenter`].
    ///
    /// Eye corners share a height per eye; the mouth corners sit level.
    pub fn observation_with(
        smile_intensity: f32,
        mouth_openness: f32,
        brow_tension: f32,
        eye_openness: f32,
    ) -> FaceObservation {
        let left_eye_y = 100.0;
        let right_eye_y = left_eye_y + eye_openness;
        let upper_lip_y = 200.0;
        let brow_gap = brow_tension / 2.0;

        let mut keypoints = vec![
            Keypoint::new(LEFT_EYE_OUTER, 60.0, left_eye_y),
            Keypoint::new(LEFT_EYE_INNER, 90.0, left_eye_y),
            Keypoint::new(RIGHT_EYE_OUTER, 170.0, right_eye_y),
            Keypoint::new(RIGHT_EYE_INNER, 140.0, right_eye_y),
            Keypoint::new(UPPER_LIP, 115.0, upper_lip_y),
            Keypoint::new(LOWER_LIP, 115.0, upper_lip_y + mouth_openness),
            Keypoint::new(MOUTH_LEFT, 85.0, upper_lip_y + smile_intensity),
            Keypoint::new(MOUTH_RIGHT, 145.0, upper_lip_y + smile_intensity),
            Keypoint::new(LEFT_BROW, 75.0, left_eye_y - brow_gap),
            Keypoint::new(RIGHT_BROW, 155.0, right_eye_y - brow_gap),
        ];
        keypoints.sort_by_key(|k| k.index);
        FaceObservation::new(keypoints)
    }
}
