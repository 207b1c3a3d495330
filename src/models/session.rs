// Data models for a guided pose session

use crate::models::pose::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ==============================================================================
// Pose Sequence
// ==============================================================================

/// Ordered, non-empty list of pose identifiers, fixed for the length of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PoseSequence(pub(crate) Vec<String>);

impl PoseSequence {
    pub fn new(poses: Vec<String>) -> Result<Self, SequenceError> {
        if poses.is_empty() {
            return Err(SequenceError::Empty);
        }
        if let Some(index) = poses.iter().position(|p| p.trim().is_empty()) {
            return Err(SequenceError::BlankPose(index));
        }
        Ok(Self(poses))
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<Vec<String>> for PoseSequence {
    type Error = SequenceError;

    fn try_from(poses: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(poses)
    }
}

impl From<PoseSequence> for Vec<String> {
    fn from(sequence: PoseSequence) -> Self {
        sequence.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("Pose sequence cannot be empty")]
    Empty,

    #[error("Pose at position {0} has a blank name")]
    BlankPose(usize),
}

// ==============================================================================
// State Machine
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the user to strike the target pose
    Waiting,
    /// Target pose matched; hold timer running
    Holding,
}

impl SessionState {
    pub fn to_string(&self) -> &'static str {
        match self {
            SessionState::Waiting => "waiting",
            SessionState::Holding => "holding",
        }
    }
}

/// State changes produced by one loop cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    HoldStarted { pose: String },
    HoldBroken { pose: String },
    PoseAdvanced { from: String, to: String },
    SequenceComplete { last: String },
}

// ==============================================================================
// Summary
// ==============================================================================

/// Counters reported when a session loop stops
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub cycles: u64,
    pub classified_cycles: u64,
    pub failures: HashMap<FailureKind, u64>,
    pub completed_poses: Vec<String>,
    pub finished: bool,
}

impl SessionSummary {
    pub fn total_failures(&self) -> u64 {
        self.failures.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_sequence_validation() {
        assert_eq!(PoseSequence::new(vec![]), Err(SequenceError::Empty));
        assert_eq!(
            PoseSequence::new(vec!["y".to_string(), " ".to_string()]),
            Err(SequenceError::BlankPose(1))
        );

        let sequence = PoseSequence::new(vec!["y".to_string(), "lunge".to_string()]).unwrap();
        assert_eq!(sequence.first(), "y");
        assert_eq!(sequence.get(1), Some("lunge"));
        assert_eq!(sequence.get(2), None);
        assert_eq!(sequence.len(), 2);
    }

    #[test]
    fn test_pose_sequence_serde_rejects_empty() {
        let parsed: Result<PoseSequence, _> = serde_json::from_str("[]");
        assert!(parsed.is_err());

        let parsed: PoseSequence = serde_json::from_str(r#"["y","warrior"]"#).unwrap();
        assert_eq!(parsed.as_slice(), &["y".to_string(), "warrior".to_string()]);
    }

    #[test]
    fn test_summary_failure_total() {
        let mut summary = SessionSummary::default();
        summary.failures.insert(FailureKind::NoDetection, 3);
        summary.failures.insert(FailureKind::ServiceUnavailable, 2);
        assert_eq!(summary.total_failures(), 5);
    }
}
