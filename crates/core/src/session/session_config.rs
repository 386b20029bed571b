use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rendering::infrastructure::renderer_factory::RendererBackend;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_ACQUISITION_TIMEOUT_SECS, DEFAULT_CONFIDENCE,
    DEFAULT_DETECTION_PERIOD_MS, DEFAULT_MOVEMENT_FACTOR, DEFAULT_RENDER_FPS,
    DEFAULT_RENDER_HEIGHT, DEFAULT_RENDER_WIDTH, TANK_OBJECT_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for a tracking session.
///
/// Stored as JSON; any field missing from the file takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Radians of rotation per pixel of horizontal face offset.
    pub movement_factor: f64,
    pub detection_period_ms: u64,
    pub confidence: f64,
    pub render_fps: u32,
    pub render_width: u32,
    pub render_height: u32,
    pub renderer: RendererBackend,
    /// Name of the scene object driven by head movement.
    pub target_object: String,
    pub acquisition_timeout_secs: u64,
    pub camera_width: Option<u32>,
    pub camera_height: Option<u32>,
    pub camera_framerate: Option<u32>,
    pub model_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            movement_factor: DEFAULT_MOVEMENT_FACTOR,
            detection_period_ms: DEFAULT_DETECTION_PERIOD_MS,
            confidence: DEFAULT_CONFIDENCE,
            render_fps: DEFAULT_RENDER_FPS,
            render_width: DEFAULT_RENDER_WIDTH,
            render_height: DEFAULT_RENDER_HEIGHT,
            renderer: RendererBackend::default(),
            target_object: TANK_OBJECT_NAME.to_string(),
            acquisition_timeout_secs: DEFAULT_ACQUISITION_TIMEOUT_SECS,
            camera_width: None,
            camera_height: None,
            camera_framerate: None,
            model_path: None,
        }
    }
}

impl SessionConfig {
    /// `<config dir>/HeadTank/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `explicit` if given, else the default config file if it exists,
    /// else the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                log::debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.movement_factor.is_finite() {
            return Err(ConfigError::Invalid(
                "movement_factor must be a finite number".into(),
            ));
        }
        if self.detection_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "detection_period_ms must be greater than 0".into(),
            ));
        }
        if self.render_fps == 0 {
            return Err(ConfigError::Invalid(
                "render_fps must be greater than 0".into(),
            ));
        }
        if self.render_width == 0 || self.render_height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render size must be non-zero, got {}x{}",
                self.render_width, self.render_height
            )));
        }
        // The MPEG-4 encoder only accepts even frame dimensions
        if self.render_width % 2 != 0 || self.render_height % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "render size must be even, got {}x{}",
                self.render_width, self.render_height
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be between 0 and 1, got {}",
                self.confidence
            )));
        }
        if self.acquisition_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "acquisition_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.target_object.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "target_object must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn detection_period(&self) -> Duration {
        Duration::from_millis(self.detection_period_ms)
    }

    pub fn render_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_fps.max(1) as f64)
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn write_config(json: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        (dir, path)
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_relative_eq!(config.movement_factor, 0.005);
        assert_eq!(config.detection_period(), Duration::from_millis(100));
        assert_eq!(config.target_object, "Tank");
        assert_eq!(config.renderer, RendererBackend::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let (_dir, path) = write_config(r#"{ "movement_factor": 0.01, "renderer": "cpu" }"#);
        let config = SessionConfig::load(&path).unwrap();

        assert_relative_eq!(config.movement_factor, 0.01);
        assert_eq!(config.renderer, RendererBackend::Cpu);
        assert_eq!(config.detection_period_ms, DEFAULT_DETECTION_PERIOD_MS);
        assert_eq!(config.render_width, DEFAULT_RENDER_WIDTH);
        assert_eq!(config.model_path, None);
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = SessionConfig {
            camera_width: Some(1280),
            camera_height: Some(720),
            model_path: Some(PathBuf::from("/models/face.onnx")),
            ..SessionConfig::default()
        };
        let json = serde_json::to_string_pretty(&config).unwrap();
        let (_dir, path) = write_config(&json);
        assert_eq!(SessionConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let (_dir, path) = write_config("{ not json");
        let err = SessionConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_renderer_is_parse_error() {
        let (_dir, path) = write_config(r#"{ "renderer": "vulkan" }"#);
        assert!(matches!(
            SessionConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = SessionConfig::load_or_default(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[rstest]
    #[case::nan_factor(SessionConfig { movement_factor: f64::NAN, ..SessionConfig::default() })]
    #[case::zero_period(SessionConfig { detection_period_ms: 0, ..SessionConfig::default() })]
    #[case::zero_fps(SessionConfig { render_fps: 0, ..SessionConfig::default() })]
    #[case::zero_width(SessionConfig { render_width: 0, ..SessionConfig::default() })]
    #[case::odd_height(SessionConfig { render_height: 601, ..SessionConfig::default() })]
    #[case::confidence_above_one(SessionConfig { confidence: 1.5, ..SessionConfig::default() })]
    #[case::negative_confidence(SessionConfig { confidence: -0.1, ..SessionConfig::default() })]
    #[case::zero_timeout(SessionConfig { acquisition_timeout_secs: 0, ..SessionConfig::default() })]
    #[case::blank_target(SessionConfig { target_object: "  ".into(), ..SessionConfig::default() })]
    fn test_validate_rejects(#[case] config: SessionConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_movement_factor_is_allowed() {
        let config = SessionConfig {
            movement_factor: -0.005,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[rstest]
    #[case(60, 16_666)]
    #[case(30, 33_333)]
    #[case(1, 1_000_000)]
    fn test_render_period(#[case] fps: u32, #[case] micros: u128) {
        let config = SessionConfig {
            render_fps: fps,
            ..SessionConfig::default()
        };
        assert_eq!(config.render_period().as_micros(), micros);
    }
}
