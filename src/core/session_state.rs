// Session state: target pose, hold timer, and prompt text

use crate::core::prompt;

/// Mutable state of one guided session. Owned by the classification loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    target_pose: Option<String>,
    start_time: Option<i64>,
    timing_enabled: bool,
    prompt: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pose the user should perform. Leaves the timer alone.
    pub fn set_target(&mut self, pose: impl Into<String>) {
        self.target_pose = Some(pose.into());
    }

    /// Toggle the hold timer; turning it on restarts it at `now_ms`
    pub fn start_or_stop_timer(&mut self, now_ms: i64) {
        self.timing_enabled = !self.timing_enabled;
        if self.timing_enabled {
            self.start_time = Some(now_ms);
        }
    }

    /// Start the timer if it is off
    pub fn start_timer(&mut self, now_ms: i64) {
        if !self.timing_enabled {
            self.start_or_stop_timer(now_ms);
        }
    }

    /// Stop the timer if it is on
    pub fn stop_timer(&mut self, now_ms: i64) {
        if self.timing_enabled {
            self.start_or_stop_timer(now_ms);
        }
    }

    /// Milliseconds since the timer started, or `None` while it is off
    pub fn elapsed(&self, now_ms: i64) -> Option<i64> {
        if !self.timing_enabled {
            return None;
        }
        self.start_time.map(|start| now_ms - start)
    }

    /// Regenerate the prompt for the current target from `draw`
    pub fn generate_prompt(&mut self, templates: &[String], draw: usize) {
        self.prompt = self
            .target_pose
            .as_deref()
            .and_then(|pose| prompt::generate_prompt(templates, pose, draw));
    }

    pub fn target_pose(&self) -> Option<&str> {
        self.target_pose.as_deref()
    }

    pub fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    pub fn timing_enabled(&self) -> bool {
        self.timing_enabled
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }
}
