use crate::core::overlay::{Rgb, COCO_COLORS};
use crate::core::prompt::{self, POSE_PLACEHOLDER};
use crate::models::pose::CocoPart;
use crate::models::session::PoseSequence;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Keypoint-extraction service endpoint (multipart image upload)
    pub keypoint_service_url: String,
    /// Pose-family classifier endpoint (multipart keypoint upload)
    pub classifier_service_url: String,
    /// Poses the session walks through, in order
    pub pose_sequence: PoseSequence,
    /// Classifier confidence (0-100) that must be strictly exceeded to count as a match
    pub confidence_threshold: f32,
    /// How long a matched pose must be held before advancing, in milliseconds
    pub hold_duration_ms: i64,
    /// Delay before the congratulation message is shown, in milliseconds
    pub congratulation_delay_ms: i64,
    /// Text shown after a pose is completed
    pub congratulation_message: String,
    /// Prompt templates; each holds exactly one `{pose}` placeholder
    pub prompt_templates: Vec<String>,
    /// Minimum spacing between loop cycles (display refresh), in milliseconds
    pub frame_interval_ms: u64,
    /// Per-request timeout for both services, in milliseconds
    pub request_timeout_ms: u64,
    /// JPEG quality (1-100) used when uploading frames
    pub jpeg_quality: u8,
    /// Overlay surface width in pixels
    pub overlay_width: u32,
    /// Overlay surface height in pixels
    pub overlay_height: u32,
    /// Keypoint marker radius in pixels
    pub point_radius: f32,
    /// Skeleton line width in pixels
    pub line_width: f32,
    /// Marker color per part id; ids past the end wrap around
    #[serde(default = "default_colors")]
    pub part_colors: Vec<Rgb>,
    /// Skeleton line color per line index; wraps like `part_colors`
    #[serde(default = "default_colors")]
    pub line_colors: Vec<Rgb>,
    /// Part names that get a marker
    #[serde(default = "default_allowed_parts")]
    pub allowed_parts: Vec<String>,
}

fn default_colors() -> Vec<Rgb> {
    COCO_COLORS.to_vec()
}

fn default_allowed_parts() -> Vec<String> {
    CocoPart::ALL.iter().map(|p| p.name().to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keypoint_service_url: "http://localhost:5000/model/predict".to_string(),
            classifier_service_url: "http://localhost:3000/svm".to_string(),
            pose_sequence: PoseSequence(vec![
                "y".to_string(),
                "lunge".to_string(),
                "warrior".to_string(),
            ]),
            confidence_threshold: 90.0,
            hold_duration_ms: 10_000,
            congratulation_delay_ms: 2_000,
            congratulation_message: "Great job :)".to_string(),
            prompt_templates: prompt::default_templates(),
            frame_interval_ms: 16,
            request_timeout_ms: 5_000,
            jpeg_quality: 90,
            overlay_width: 640,
            overlay_height: 480,
            point_radius: 4.0,
            line_width: 2.0,
            part_colors: default_colors(),
            line_colors: default_colors(),
            allowed_parts: default_allowed_parts(),
        }
    }
}

impl Config {
    /// Load configuration from the default path, creating it with defaults if it doesn't exist
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::get_config_path()?)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, url) in [
            ("keypoint service", &self.keypoint_service_url),
            ("classifier service", &self.classifier_service_url),
        ] {
            reqwest::Url::parse(url).map_err(|e| {
                ConfigError::Invalid(format!("Invalid {} URL {}: {}", name, url, e))
            })?;
        }

        if !(0.0..=100.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "Invalid confidence threshold: {}. Must be between 0 and 100",
                self.confidence_threshold
            )));
        }

        if self.hold_duration_ms <= 0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid hold duration: {} ms. Must be positive",
                self.hold_duration_ms
            )));
        }

        if self.congratulation_delay_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid congratulation delay: {} ms. Must not be negative",
                self.congratulation_delay_ms
            )));
        }

        if self.frame_interval_ms == 0 || self.frame_interval_ms > 1_000 {
            return Err(ConfigError::Invalid(format!(
                "Invalid frame interval: {} ms. Must be between 1 and 1000",
                self.frame_interval_ms
            )));
        }

        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Request timeout must be positive".to_string(),
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "Invalid JPEG quality: {}. Must be between 1 and 100",
                self.jpeg_quality
            )));
        }

        if self.overlay_width == 0 || self.overlay_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Invalid overlay size: {}x{}",
                self.overlay_width, self.overlay_height
            )));
        }

        if !(self.point_radius.is_finite() && self.point_radius > 0.0)
            || !(self.line_width.is_finite() && self.line_width > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "Invalid marker size: radius {}, line width {}",
                self.point_radius, self.line_width
            )));
        }

        if self.part_colors.is_empty() || self.line_colors.is_empty() {
            return Err(ConfigError::Invalid(
                "Part and line color tables cannot be empty".to_string(),
            ));
        }

        if let Some(index) = self.allowed_parts.iter().position(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "Allowed part at position {} has a blank name",
                index
            )));
        }

        if self.prompt_templates.is_empty() {
            return Err(ConfigError::Invalid(
                "Prompt templates cannot be empty".to_string(),
            ));
        }

        for template in &self.prompt_templates {
            if template.matches(POSE_PLACEHOLDER).count() != 1 {
                return Err(ConfigError::Invalid(format!(
                    "Prompt template must contain {} exactly once: {}",
                    POSE_PLACEHOLDER, template
                )));
            }
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> ConfigResult<Self> {
        let config = Self::default();
        config.save()?;
        Ok(config)
    }

    /// Overwrite an explicit file with the default configuration
    pub fn reset_at(path: &Path) -> ConfigResult<Self> {
        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn get_config_path() -> ConfigResult<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| ConfigError::NoHomeDir)?;

        let mut path = PathBuf::from(home);
        path.push(".posecoach");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pose_sequence.as_slice(), &["y", "lunge", "warrior"]);
        assert_eq!(config.confidence_threshold, 90.0);
        assert_eq!(config.hold_duration_ms, 10_000);
        assert_eq!(config.congratulation_delay_ms, 2_000);
        assert_eq!(config.congratulation_message, "Great job :)");
        assert_eq!(config.overlay_width, 640);
        assert_eq!(config.overlay_height, 480);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.keypoint_service_url = "not a url".to_string();
        assert!(config.validate().is_err());
        config.keypoint_service_url = Config::default().keypoint_service_url;

        config.confidence_threshold = 101.0;
        assert!(config.validate().is_err());
        config.confidence_threshold = 90.0;

        config.hold_duration_ms = 0;
        assert!(config.validate().is_err());
        config.hold_duration_ms = 10_000;

        config.frame_interval_ms = 0;
        assert!(config.validate().is_err());
        config.frame_interval_ms = 2_000;
        assert!(config.validate().is_err());
        config.frame_interval_ms = 16;

        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.request_timeout_ms = 5_000;

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.jpeg_quality = 90;

        config.prompt_templates = vec!["no placeholder".to_string()];
        assert!(config.validate().is_err());
        config.prompt_templates = vec!["{pose} and {pose}".to_string()];
        assert!(config.validate().is_err());
        config.prompt_templates = vec![];
        assert!(config.validate().is_err());
        config.prompt_templates = vec!["Do {pose}".to_string()];

        config.point_radius = f32::NAN;
        assert!(config.validate().is_err());
        config.point_radius = 4.0;
        config.line_width = 0.0;
        assert!(config.validate().is_err());
        config.line_width = 2.0;

        config.part_colors = vec![];
        assert!(config.validate().is_err());
        config.part_colors = vec![Rgb::new(1, 2, 3)];
        config.line_colors = vec![];
        assert!(config.validate().is_err());
        config.line_colors = vec![Rgb::new(4, 5, 6)];

        config.allowed_parts = vec!["Nose".to_string(), " ".to_string()];
        assert!(config.validate().is_err());
        config.allowed_parts = vec![];

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_empty_pose_sequence_rejected_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut value = serde_json::to_value(Config::default()).unwrap();
        value["pose_sequence"] = serde_json::json!([]);
        std::fs::write(&path, value.to_string()).unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut config = Config::default();
        config.hold_duration_ms = 5_000;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_reset_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut config = Config::default();
        config.confidence_threshold = 75.0;
        config.allowed_parts = vec!["Nose".to_string()];
        config.save_to(&path).unwrap();

        let reset = Config::reset_at(&path).unwrap();
        assert_eq!(reset, Config::default());
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_overlay_settings_default_when_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut value = serde_json::to_value(Config::default()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("part_colors");
        object.remove("line_colors");
        object.remove("allowed_parts");
        std::fs::write(&path, value.to_string()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.part_colors, COCO_COLORS.to_vec());
        assert_eq!(loaded.line_colors.len(), 18);
        assert_eq!(loaded.allowed_parts.len(), 18);
        assert_eq!(loaded.allowed_parts[0], "Nose");
    }
}
