use std::path::PathBuf;
use std::time::Duration;

use kiosk_core::detector::SCRFD_MODEL_FILE;
use kiosk_session::auth::DEFAULT_AUTH_URL;
use kiosk_session::{AuthConfig, CoordinatorConfig};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Frame rate requested from the camera.
    pub camera_fps: u32,
    /// Camera preview surface name, passed through to logs.
    pub preview_target: String,
    /// Directory containing the SCRFD model.
    pub model_dir: PathBuf,
    /// Minimum detector confidence for a face to count as present.
    pub min_confidence: f32,
    /// Consecutive absent frames tolerated before a departure.
    pub absence_threshold: u32,
    /// Session token endpoint.
    pub auth_url: String,
    /// Avatar vendor API key. Required.
    pub api_key: String,
    pub auth_timeout: Duration,
    /// Video surface the avatar stream is bound to.
    pub avatar_target: String,
    /// Persona TOML; the embedded default when unset.
    pub persona_path: Option<PathBuf>,
    /// Auto-start delay used when the detector cannot be loaded.
    pub fallback_start: Option<Duration>,
}

impl Config {
    /// Load configuration from `KIOSK_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = get("KIOSK_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("KIOSK_API_KEY"))?;

        Ok(Self {
            camera_device: get("KIOSK_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            camera_fps: parsed(&get, "KIOSK_CAMERA_FPS", 30),
            preview_target: get("KIOSK_PREVIEW_TARGET")
                .unwrap_or_else(|| "camera-preview".to_string()),
            model_dir: get("KIOSK_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(kiosk_core::default_model_dir),
            min_confidence: parsed(
                &get,
                "KIOSK_MIN_CONFIDENCE",
                kiosk_core::presence::DEFAULT_MIN_CONFIDENCE,
            ),
            absence_threshold: parsed(
                &get,
                "KIOSK_ABSENCE_THRESHOLD",
                kiosk_core::debounce::DEFAULT_ABSENCE_THRESHOLD,
            ),
            auth_url: get("KIOSK_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            api_key,
            auth_timeout: Duration::from_secs(parsed(&get, "KIOSK_AUTH_TIMEOUT_SECS", 15)),
            avatar_target: get("KIOSK_AVATAR_TARGET")
                .unwrap_or_else(|| "persona-video".to_string()),
            persona_path: get("KIOSK_PERSONA_PATH").map(PathBuf::from),
            fallback_start: Some(parsed::<u64>(&get, "KIOSK_FALLBACK_START_SECS", 0))
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs),
        })
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.auth_url, &self.api_key).with_timeout(self.auth_timeout)
    }

    pub fn coordinator_config(&self, intro: &str) -> CoordinatorConfig {
        CoordinatorConfig {
            avatar_target: self.avatar_target.clone(),
            intro: intro.to_string(),
        }
    }
}

fn parsed<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
    }
}
