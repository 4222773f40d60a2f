use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of the environment variables that override file settings,
/// e.g. `SENTINEL_ALERT__BASE_URL`.
const ENV_PREFIX: &str = "SENTINEL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitor: MonitorSettings,
    pub alert: AlertSettings,
    pub camera: CameraSettings,
    pub classifier: ClassifierSettings,
    pub logging: LoggingSettings,
}

/// Timing and decision thresholds of the monitoring loop
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub capture_interval_ms: u64,
    pub fire_confidence_threshold: f32,
    pub required_consecutive_hits: u32,
    pub alert_cooldown_ms: i64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            capture_interval_ms: 5_000,
            fire_confidence_threshold: 0.80,
            required_consecutive_hits: 3,
            alert_cooldown_ms: 60_000,
        }
    }
}

impl MonitorSettings {
    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.capture_interval_ms == 0 {
            return Err("Capture interval must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.fire_confidence_threshold) {
            return Err("Fire confidence threshold must be between 0.0 and 1.0".to_string());
        }

        if self.required_consecutive_hits == 0 {
            return Err("Required consecutive hits must be greater than 0".to_string());
        }

        if self.alert_cooldown_ms < 0 {
            return Err("Alert cooldown must not be negative".to_string());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub base_url: String,
    pub api_key: String,
    pub device_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub frames_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Program followed by its arguments. From the environment, a space-separated list.
    pub command: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_ms: 30_000,
        }
    }
}

impl ClassifierSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from an optional file, then applies `SENTINEL_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(environment());

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.monitor.validate().map_err(AppError::InvalidConfig)?;
        if self.classifier.timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "Classifier timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("classifier.command")
}

/// Trims the configured server address and drops trailing slashes.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
