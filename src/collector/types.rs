//! Sample types for the three sensor streams.
//!
//! Wire-level frames are validated here, at the producer boundary. Everything
//! past this module works with fixed-size arrays and never re-checks shapes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A 3×3 rotation matrix, row-major.
pub type Rotation3 = [[f64; 3]; 3];

/// Facial-expression names reported by the face tracker, in column order.
pub const BLENDSHAPE_NAMES: [&str; 52] = [
    "_neutral",
    "browDownLeft",
    "browDownRight",
    "browInnerUp",
    "browOuterUpLeft",
    "browOuterUpRight",
    "cheekPuff",
    "cheekSquintLeft",
    "cheekSquintRight",
    "eyeBlinkLeft",
    "eyeBlinkRight",
    "eyeLookDownLeft",
    "eyeLookDownRight",
    "eyeLookInLeft",
    "eyeLookInRight",
    "eyeLookOutLeft",
    "eyeLookOutRight",
    "eyeLookUpLeft",
    "eyeLookUpRight",
    "eyeSquintLeft",
    "eyeSquintRight",
    "eyeWideLeft",
    "eyeWideRight",
    "jawForward",
    "jawLeft",
    "jawOpen",
    "jawRight",
    "mouthClose",
    "mouthDimpleLeft",
    "mouthDimpleRight",
    "mouthFrownLeft",
    "mouthFrownRight",
    "mouthFunnel",
    "mouthLeft",
    "mouthLowerDownLeft",
    "mouthLowerDownRight",
    "mouthPressLeft",
    "mouthPressRight",
    "mouthPucker",
    "mouthRight",
    "mouthRollLower",
    "mouthRollUpper",
    "mouthShrugLower",
    "mouthShrugUpper",
    "mouthSmileLeft",
    "mouthSmileRight",
    "mouthStretchLeft",
    "mouthStretchRight",
    "mouthUpperUpLeft",
    "mouthUpperUpRight",
    "noseSneerLeft",
    "noseSneerRight",
];

/// Number of blendshape columns.
pub const BLENDSHAPE_COUNT: usize = BLENDSHAPE_NAMES.len();

/// Look up the column index of a blendshape name.
pub fn blendshape_index(name: &str) -> Option<usize> {
    BLENDSHAPE_NAMES.iter().position(|&n| n == name)
}

/// Blendshape intensities keyed by the fixed vocabulary.
///
/// A missing key is `None`, which is different from an intensity of 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendshapeSet([Option<f64>; BLENDSHAPE_COUNT]);

impl Default for BlendshapeSet {
    fn default() -> Self {
        Self([None; BLENDSHAPE_COUNT])
    }
}

impl BlendshapeSet {
    /// Set a value by name. Returns false for names outside the vocabulary.
    pub fn insert(&mut self, name: &str, value: f64) -> bool {
        match blendshape_index(name) {
            Some(idx) => {
                self.0[idx] = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.0.get(idx).copied().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Iterate over `(column index, value)` for the keys that are present.
    pub fn present(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(idx, v)| v.map(|v| (idx, v)))
    }
}

/// One validated frame from the face tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    /// Producer clock, seconds
    pub timestamp: f64,
    pub blendshapes: BlendshapeSet,
    /// Mean skin colour, R,G,B
    pub avg_rgb: Option<[f64; 3]>,
    pub rotation: Option<Rotation3>,
    pub translation: Option<[f64; 3]>,
}

impl FaceSample {
    /// A sample carrying only a timestamp and a colour.
    pub fn with_color(timestamp: f64, rgb: [f64; 3]) -> Self {
        Self {
            timestamp,
            blendshapes: BlendshapeSet::default(),
            avg_rgb: Some(rgb),
            rotation: None,
            translation: None,
        }
    }
}

/// What a face frame means for the face history.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceUpdate {
    /// A tracked face; append it.
    Sample(FaceSample),
    /// No face in view; discard everything buffered so far.
    Lost,
}

/// An inertial sample. `gyro` may hold angular rate or a heading delta,
/// depending on the device; both are treated as an opaque 3-vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    pub timestamp: f64,
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

/// A positional fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub timestamp: f64,
    /// Decimal degrees
    pub lat: f64,
    /// Decimal degrees
    pub lon: f64,
    /// km/h
    pub speed: f64,
}

/// Unified event type for everything a producer can hand to the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Face(FaceUpdate),
    Inertial(InertialSample),
    Position(PositionSample),
}

/// A face frame as it arrives on the wire (one JSON object per line).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaceFrame {
    pub timestamp: f64,
    #[serde(default)]
    pub blendshapes: HashMap<String, f64>,
    #[serde(default)]
    pub avg_rgb: Vec<f64>,
    /// Usually 4×4; only the leading 3×3 block is used.
    #[serde(default)]
    pub rotation_matrix: Vec<Vec<f64>>,
    #[serde(default)]
    pub translation_vector: Vec<f64>,
}

/// Reasons a frame is rejected at the producer boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    Json(String),
    NonFiniteTimestamp,
    ColorShape(usize),
    RotationShape,
    TranslationShape(usize),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Json(e) => write!(f, "JSON error: {e}"),
            FrameError::NonFiniteTimestamp => write!(f, "timestamp is not finite"),
            FrameError::ColorShape(n) => write!(f, "avg_rgb has {n} entries, expected 3"),
            FrameError::RotationShape => write!(f, "rotation_matrix is smaller than 3x3"),
            FrameError::TranslationShape(n) => {
                write!(f, "translation_vector has {n} entries, expected at least 3")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl FaceFrame {
    /// Parse one line of the face wire protocol.
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        serde_json::from_str(line).map_err(|e| FrameError::Json(e.to_string()))
    }

    /// Validate the frame and decide what it means for the face history.
    pub fn into_update(self) -> Result<FaceUpdate, FrameError> {
        if self.blendshapes.is_empty() && self.avg_rgb.is_empty() && self.rotation_matrix.is_empty()
        {
            return Ok(FaceUpdate::Lost);
        }
        if !self.timestamp.is_finite() {
            return Err(FrameError::NonFiniteTimestamp);
        }

        let avg_rgb = match self.avg_rgb.as_slice() {
            [] => None,
            [r, g, b] => Some([*r, *g, *b]),
            other => return Err(FrameError::ColorShape(other.len())),
        };

        let rotation = if self.rotation_matrix.is_empty() {
            None
        } else {
            Some(leading_3x3(&self.rotation_matrix).ok_or(FrameError::RotationShape)?)
        };

        let translation = match self.translation_vector.as_slice() {
            [] => None,
            [x, y, z, ..] => Some([*x, *y, *z]),
            other => return Err(FrameError::TranslationShape(other.len())),
        };

        let mut blendshapes = BlendshapeSet::default();
        for (name, value) in &self.blendshapes {
            if !blendshapes.insert(name, *value) {
                tracing::trace!(name = %name, "ignoring unknown blendshape");
            }
        }

        Ok(FaceUpdate::Sample(FaceSample {
            timestamp: self.timestamp,
            blendshapes,
            avg_rgb,
            rotation,
            translation,
        }))
    }
}

fn leading_3x3(rows: &[Vec<f64>]) -> Option<Rotation3> {
    if rows.len() < 3 || rows[..3].iter().any(|row| row.len() < 3) {
        return None;
    }
    let mut m = [[0.0; 3]; 3];
    for (i, row) in rows.iter().take(3).enumerate() {
        m[i].copy_from_slice(&row[..3]);
    }
    Some(m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_unique() {
        for (i, name) in BLENDSHAPE_NAMES.iter().enumerate() {
            assert_eq!(blendshape_index(name), Some(i));
        }
        assert_eq!(BLENDSHAPE_COUNT, 52);
    }

    #[test]
    fn test_unknown_blendshape_rejected() {
        let mut set = BlendshapeSet::default();
        assert!(set.insert("jawOpen", 0.4));
        assert!(!set.insert("tongueOut", 0.9));
        assert_eq!(set.present().count(), 1);
    }

    #[test]
    fn test_full_frame_parses() {
        let line = r#"{"timestamp": 12.5,
            "blendshapes": {"eyeBlinkLeft": 0.2, "notAShape": 1.0},
            "avg_rgb": [120.0, 90.5, 80.0],
            "rotation_matrix": [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]],
            "translation_vector": [0.1, 0.2, -30.0, 1.0]}"#;

        let update = FaceFrame::parse(line).unwrap().into_update().unwrap();
        let FaceUpdate::Sample(sample) = update else {
            panic!("expected a sample");
        };
        assert_eq!(sample.avg_rgb, Some([120.0, 90.5, 80.0]));
        assert_eq!(sample.rotation.unwrap()[2], [0.0, 0.0, 1.0]);
        assert_eq!(sample.translation, Some([0.1, 0.2, -30.0]));
        assert_eq!(
            sample.blendshapes.get(blendshape_index("eyeBlinkLeft").unwrap()),
            Some(0.2)
        );
    }

    #[test]
    fn test_empty_frame_is_face_lost() {
        let update = FaceFrame::parse(r#"{"timestamp": 3.0, "blendshapes": {}, "avg_rgb": []}"#)
            .unwrap()
            .into_update()
            .unwrap();
        assert_eq!(update, FaceUpdate::Lost);
    }

    #[test]
    fn test_malformed_shapes_rejected() {
        let frame = FaceFrame {
            timestamp: 1.0,
            avg_rgb: vec![1.0, 2.0],
            ..Default::default()
        };
        assert_eq!(frame.into_update(), Err(FrameError::ColorShape(2)));

        let frame = FaceFrame {
            timestamp: 1.0,
            avg_rgb: vec![1.0, 2.0, 3.0],
            rotation_matrix: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            ..Default::default()
        };
        assert_eq!(frame.into_update(), Err(FrameError::RotationShape));

        assert!(matches!(FaceFrame::parse("{not json"), Err(FrameError::Json(_))));
    }
}
