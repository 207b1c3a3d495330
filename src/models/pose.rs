// Data models for keypoint detection and pose classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==============================================================================
// Keypoint service payloads
// ==============================================================================

/// One detected body part, as reported by the keypoint service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyPart {
    pub part_name: String,
    pub part_id: u32,
    pub x: f32,
    pub y: f32,
}

/// Skeleton segment between two keypoints, in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseLineWire", into = "PoseLineWire")]
pub struct PoseLine {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// The keypoint service wraps each quadruple in `{"line": [...]}`; bare arrays are accepted too
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum PoseLineWire {
    Wrapped { line: [f32; 4] },
    Bare([f32; 4]),
}

impl From<PoseLineWire> for PoseLine {
    fn from(wire: PoseLineWire) -> Self {
        let [x1, y1, x2, y2] = match wire {
            PoseLineWire::Wrapped { line } => line,
            PoseLineWire::Bare(line) => line,
        };
        Self { x1, y1, x2, y2 }
    }
}

impl From<PoseLine> for PoseLineWire {
    fn from(line: PoseLine) -> Self {
        PoseLineWire::Wrapped {
            line: [line.x1, line.y1, line.x2, line.y2],
        }
    }
}

/// A single detected subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub body_parts: Vec<BodyPart>,
    #[serde(default)]
    pub pose_lines: Vec<PoseLine>,
}

/// Top-level keypoint service response
#[derive(Debug, Clone, Deserialize)]
pub struct KeypointResponse {
    pub predictions: Vec<Detection>,
}

/// A keypoint reduced to what the classifier and state machine care about
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub part_id: u32,
}

impl Detection {
    /// Body-part name to keypoint mapping; later duplicates win
    pub fn keypoint_set(&self) -> BTreeMap<String, Keypoint> {
        self.body_parts
            .iter()
            .map(|part| {
                (
                    part.part_name.clone(),
                    Keypoint {
                        x: part.x,
                        y: part.y,
                        part_id: part.part_id,
                    },
                )
            })
            .collect()
    }
}

// ==============================================================================
// Classification Result (Unified Result)
// ==============================================================================

/// Merged output of one inference round-trip
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    /// Every detected subject; never empty
    pub predictions: Vec<Detection>,
    pub predicted_pose: String,
    /// Classifier certainty in [0, 100]
    pub confidence: f32,
}

impl ClassificationResult {
    /// Keypoints of the first detected subject, the one that drives the state machine
    pub fn keypoint_set(&self) -> BTreeMap<String, Keypoint> {
        self.predictions
            .first()
            .map(Detection::keypoint_set)
            .unwrap_or_default()
    }

    /// Pose lines of the first detected subject
    pub fn pose_lines(&self) -> &[PoseLine] {
        self.predictions
            .first()
            .map(|d| d.pose_lines.as_slice())
            .unwrap_or(&[])
    }
}

// ==============================================================================
// COCO body parts (18 keypoints)
// ==============================================================================

/// COCO keypoint indices as used by the keypoint service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CocoPart {
    Nose = 0,
    Neck = 1,
    RShoulder = 2,
    RElbow = 3,
    RWrist = 4,
    LShoulder = 5,
    LElbow = 6,
    LWrist = 7,
    RHip = 8,
    RKnee = 9,
    RAnkle = 10,
    LHip = 11,
    LKnee = 12,
    LAnkle = 13,
    REye = 14,
    LEye = 15,
    REar = 16,
    LEar = 17,
}

impl CocoPart {
    pub const ALL: [CocoPart; 18] = [
        CocoPart::Nose,
        CocoPart::Neck,
        CocoPart::RShoulder,
        CocoPart::RElbow,
        CocoPart::RWrist,
        CocoPart::LShoulder,
        CocoPart::LElbow,
        CocoPart::LWrist,
        CocoPart::RHip,
        CocoPart::RKnee,
        CocoPart::RAnkle,
        CocoPart::LHip,
        CocoPart::LKnee,
        CocoPart::LAnkle,
        CocoPart::REye,
        CocoPart::LEye,
        CocoPart::REar,
        CocoPart::LEar,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CocoPart::Nose => "Nose",
            CocoPart::Neck => "Neck",
            CocoPart::RShoulder => "RShoulder",
            CocoPart::RElbow => "RElbow",
            CocoPart::RWrist => "RWrist",
            CocoPart::LShoulder => "LShoulder",
            CocoPart::LElbow => "LElbow",
            CocoPart::LWrist => "LWrist",
            CocoPart::RHip => "RHip",
            CocoPart::RKnee => "RKnee",
            CocoPart::RAnkle => "RAnkle",
            CocoPart::LHip => "LHip",
            CocoPart::LKnee => "LKnee",
            CocoPart::LAnkle => "LAnkle",
            CocoPart::REye => "REye",
            CocoPart::LEye => "LEye",
            CocoPart::REar => "REar",
            CocoPart::LEar => "LEar",
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

/// Why a classification round-trip produced no result
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Frame could not be encoded: {0}")]
    EncodeError(String),

    #[error("No subject detected in frame")]
    NoDetection,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Payload-free tag of a [`ClassifyError`], used for counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EncodeError,
    NoDetection,
    ServiceUnavailable,
    MalformedResponse,
}

impl ClassifyError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClassifyError::EncodeError(_) => FailureKind::EncodeError,
            ClassifyError::NoDetection => FailureKind::NoDetection,
            ClassifyError::ServiceUnavailable(_) => FailureKind::ServiceUnavailable,
            ClassifyError::MalformedResponse(_) => FailureKind::MalformedResponse,
        }
    }
}

impl FailureKind {
    pub fn to_string(&self) -> &'static str {
        match self {
            FailureKind::EncodeError => "encode_error",
            FailureKind::NoDetection => "no_detection",
            FailureKind::ServiceUnavailable => "service_unavailable",
            FailureKind::MalformedResponse => "malformed_response",
        }
    }
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;
