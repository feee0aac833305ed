use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CANDIDATES: [&str; 4] = [
    "stackrun.local.yaml",
    ".stackrun.local.yaml",
    "stackrun.yaml",
    ".stackrun.yaml",
];

/// Timing and pool tuning for life-cycle runs
///
/// Every field has a default so a partial settings file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Sleep between two job-status polls
    pub poll_interval_secs: u64,
    /// Wall-clock budget for one deploy or destroy job
    pub job_timeout_secs: u64,
    /// Pause between a finished deploy and the destroy call
    pub settle_delay_secs: u64,
    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,
    /// Number of test cases run concurrently by `suite`
    pub pool_size: usize,
    /// Interval at which `suite` re-reads the test case status files
    pub worker_pause_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
            job_timeout_secs: 60 * 60,
            settle_delay_secs: 60,
            request_timeout_secs: 60,
            pool_size: 7,
            worker_pause_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from the first file found by [`find_settings_file`],
    /// or the defaults when there is none
    pub fn load() -> Result<Self> {
        match find_settings_file()? {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Settings {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        settings.validate(path)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| ConfigError::Settings {
            path: path.to_path_buf(),
            message: message.to_string(),
        };
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs must be greater than zero"));
        }
        if self.pool_size == 0 {
            return Err(invalid("pool_size must be greater than zero"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn worker_pause(&self) -> Duration {
        Duration::from_secs(self.worker_pause_secs)
    }
}

/// Find the settings file
///
/// Search order:
/// 1. `STACKRUN_CONFIG` environment variable (direct path)
/// 2. current directory: stackrun.local.yaml, .stackrun.local.yaml, stackrun.yaml, .stackrun.yaml
/// 3. ~/.config/stackrun/stackrun.yaml
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var("STACKRUN_CONFIG") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "STACKRUN_CONFIG points to {} which does not exist",
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackrun").join("stackrun.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
