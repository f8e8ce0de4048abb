//! Engine configuration loaded from `parcelflow.toml`.
//!
//! # Responsibility
//! - Hold every tunable of the lifecycle engine with a sensible default.
//! - Parse and validate TOML input.
//!
//! # Invariants
//! - A missing file yields `EngineConfig::default()`.
//! - A returned config always passes `validate`.

use crate::logging::default_log_level;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

static PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,8}$").expect("valid tracking prefix regex"));

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(details) => write!(f, "invalid config: {details}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Lifecycle engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// First segment of generated tracking codes.
    pub tracking_code_prefix: String,
    /// Days added to creation time for the initial delivery estimate.
    pub estimated_delivery_days: u32,
    /// Whether staff get an ALERT for every new parcel.
    pub alert_staff_on_create: bool,
    /// Cap on `recentNotifications` in parcel views.
    pub recent_notifications_limit: u32,
    pub busy_timeout_ms: u64,
    pub log_level: String,
    pub database_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracking_code_prefix: "PD".to_string(),
            estimated_delivery_days: 2,
            alert_staff_on_create: true,
            recent_notifications_limit: 5,
            busy_timeout_ms: 5_000,
            log_level: default_log_level().to_string(),
            database_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates TOML text. Absent keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PREFIX_RE.is_match(&self.tracking_code_prefix) {
            return Err(ConfigError::Invalid(format!(
                "tracking_code_prefix `{}` must be 1-8 uppercase letters or digits",
                self.tracking_code_prefix
            )));
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Estimated delivery offset in epoch milliseconds.
    pub fn estimated_delivery_offset_ms(&self) -> i64 {
        i64::from(self.estimated_delivery_days) * 86_400_000
    }
}
