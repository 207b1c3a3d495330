// Motivational prompts shown while waiting for the target pose

/// Placeholder replaced by the target pose name
pub const POSE_PLACEHOLDER: &str = "{pose}";

pub fn default_templates() -> Vec<String> {
    [
        "Let's get into {pose} pose!",
        "Time for {pose}. You've got this!",
        "Breathe in, breathe out, and move into {pose}.",
        "Show me your best {pose}!",
        "Find your balance in {pose} pose.",
        "Next up: {pose}. Take it slow.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Build a prompt from `templates[draw % len]` with the pose name substituted.
///
/// `draw` is the caller's random number, so the same draw always gives the same
/// text. Returns `None` when there are no templates.
pub fn generate_prompt(templates: &[String], target_pose: &str, draw: usize) -> Option<String> {
    if templates.is_empty() {
        return None;
    }
    let template = &templates[draw % templates.len()];
    Some(template.replacen(POSE_PLACEHOLDER, target_pose, 1))
}
