// Layered settings: optional config file under VIGIL__ environment overrides
// reason: `config` crate handles file formats and env layering
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use vigil_core::application::constants::{
    DEFAULT_CYCLE_TIMEOUT, DEFAULT_SCHEDULER_DELAY, DEFAULT_SCHEDULER_PERIOD,
};
use vigil_core::application::SchedulerConfig;
use vigil_core::domain::RegistrationFilter;
use vigil_core::{AppError, Result};

use crate::catalog::{ProbeSpec, PublisherSpec};

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "VIGIL_CONFIG";

/// Settings file used when `VIGIL_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

/// `[scheduler]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub delay_ms: u64,
    pub period_ms: u64,
    pub timeout_ms: u64,
    /// Only run registrations having any of these tags; empty runs all
    pub tags: Vec<String>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_SCHEDULER_DELAY.as_millis() as u64,
            period_ms: DEFAULT_SCHEDULER_PERIOD.as_millis() as u64,
            timeout_ms: DEFAULT_CYCLE_TIMEOUT.as_millis() as u64,
            tags: Vec::new(),
        }
    }
}

impl SchedulerSettings {
    /// Convert to a validated `SchedulerConfig`
    ///
    /// # Errors
    /// AppError::Domain when period or timeout is zero
    pub fn to_config(&self) -> Result<SchedulerConfig> {
        let mut config = SchedulerConfig::default()
            .with_delay(Duration::from_millis(self.delay_ms))
            .with_period(Duration::from_millis(self.period_ms))
            .with_timeout(Duration::from_millis(self.timeout_ms));

        if !self.tags.is_empty() {
            config = config.with_predicate(RegistrationFilter::with_any_tag(self.tags.iter().cloned()));
        }

        config.validate()?;
        Ok(config)
    }
}

/// Everything the daemon and CLI read from settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub probes: Vec<ProbeSpec>,
    pub publishers: Vec<PublisherSpec>,
}

impl Settings {
    /// Load settings from `path` (or `VIGIL_CONFIG`, or `vigil.toml`) plus environment
    ///
    /// An explicitly named file must exist; the default file is optional.
    ///
    /// # Errors
    /// AppError::Config on a missing explicit file, a parse error, or an
    /// unknown probe/publisher kind
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (file, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var(CONFIG_PATH_ENV) {
                Ok(path) => (PathBuf::from(path), true),
                Err(_) => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
            },
        };

        Self::build(&file, required, true)
    }

    /// Load settings from a file only, ignoring the environment
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::build(path, true, false)
    }

    fn build(file: &Path, required: bool, with_env: bool) -> Result<Self> {
        debug!(file = %file.display(), required = required, "Loading settings");

        let mut builder = Config::builder().add_source(File::from(file).required(required));
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix("VIGIL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))
    }
}
