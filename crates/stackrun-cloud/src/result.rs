//! Outcome of one life-cycle run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timings and errors of one deploy → destroy sequence
///
/// Errors are kept as rendered messages so a batch of results can be written
/// out and read back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentResult {
    pub name: String,

    pub deploy_start_time: Option<DateTime<Utc>>,
    pub deploy_end_time: Option<DateTime<Utc>>,
    #[serde(with = "duration_secs")]
    pub deploy_duration: Option<Duration>,
    pub deploy_error: Option<String>,

    /// Set once the destroy phase has been entered
    pub teardown_attempted: bool,
    pub destroy_start_time: Option<DateTime<Utc>>,
    pub destroy_end_time: Option<DateTime<Utc>>,
    #[serde(with = "duration_secs")]
    pub destroy_duration: Option<Duration>,
    pub destroy_error: Option<String>,

    /// Failure to delete the imported template resource
    pub template_error: Option<String>,
}

impl DeploymentResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn deploy_succeeded(&self) -> bool {
        self.deploy_error.is_none() && self.deploy_duration.is_some()
    }

    pub fn is_success(&self) -> bool {
        self.deploy_error.is_none() && self.destroy_error.is_none() && self.template_error.is_none()
    }

    /// Every recorded error, phase first
    pub fn errors(&self) -> Vec<String> {
        [
            ("deploy", &self.deploy_error),
            ("destroy", &self.destroy_error),
            ("template", &self.template_error),
        ]
        .into_iter()
        .filter_map(|(phase, error)| error.as_ref().map(|e| format!("{}: {}", phase, e)))
        .collect()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => s.serialize_some(&duration.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_are_listed_by_phase() {
        let mut result = DeploymentResult::new("s1");
        assert!(result.is_success());
        assert!(result.errors().is_empty());

        result.destroy_error = Some("timeout".to_string());
        result.template_error = Some("404".to_string());
        assert!(!result.is_success());
        assert_eq!(result.errors(), vec!["destroy: timeout", "template: 404"]);
    }

    #[test]
    fn test_durations_serialize_as_seconds() {
        let mut result = DeploymentResult::new("s1");
        result.deploy_duration = Some(Duration::from_millis(1500));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["deploy_duration"], 1.5);
        assert!(value["destroy_duration"].is_null());

        let back: DeploymentResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.deploy_duration, Some(Duration::from_millis(1500)));
    }
}
