//! Aggregate statistics over many life-cycle runs

use crate::result::DeploymentResult;
use chrono::{DateTime, Utc};
use std::fmt::{self, Write};
use std::time::Duration;

/// Counts and durations for one phase (deploy or destroy)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseStats {
    pub durations: Vec<Duration>,
    pub failed: Vec<String>,
}

impl PhaseStats {
    pub fn attempted(&self) -> usize {
        self.durations.len() + self.failed.len()
    }

    pub fn passed(&self) -> usize {
        self.durations.len()
    }

    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.durations.len()).ok().filter(|n| *n > 0)?;
        Some(self.durations.iter().sum::<Duration>() / count)
    }

    pub fn min(&self) -> Option<Duration> {
        self.durations.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.durations.iter().max().copied()
    }

    fn render(&self, out: &mut String, noun: &str) -> fmt::Result {
        writeln!(out, "Number of attempted {}: {}", noun, self.attempted())?;
        writeln!(out, "Number of failed: {}", self.failed.len())?;
        writeln!(out, "Number of passed: {}", self.passed())?;
        writeln!(out, "Average duration for success: {}", fmt_optional(self.average()))?;
        writeln!(out, "Minimum time: {}", fmt_optional(self.min()))?;
        writeln!(out, "Maximum time: {}", fmt_optional(self.max()))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub deploy: PhaseStats,
    pub destroy: PhaseStats,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// `label: value` lines describing the run's environment
    pub context: Vec<(String, String)>,
}

impl Statistics {
    pub fn from_results(results: &[DeploymentResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            stats.add(result);
        }
        stats
    }

    pub fn add(&mut self, result: &DeploymentResult) {
        match (&result.deploy_error, result.deploy_duration) {
            (None, Some(duration)) => self.deploy.durations.push(duration),
            _ => self.deploy.failed.push(result.name.clone()),
        }
        if result.teardown_attempted {
            match (&result.destroy_error, result.destroy_duration) {
                (None, Some(duration)) => self.destroy.durations.push(duration),
                _ => self.destroy.failed.push(result.name.clone()),
            }
        }
    }

    pub fn with_context(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((label.into(), value.into()));
        self
    }

    /// Plain-text report
    pub fn report(&self) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> fmt::Result {
        for (label, value) in &self.context {
            writeln!(out, "{}: {}", label, value)?;
        }
        if !self.context.is_empty() {
            writeln!(out)?;
        }
        if let Some(start) = self.start_time {
            writeln!(out, "Start time: {}", start.format("%Y-%m-%d %H:%M:%S"))?;
        }
        if let Some(end) = self.end_time {
            writeln!(out, "End time: {}", end.format("%Y-%m-%d %H:%M:%S"))?;
        }

        writeln!(out)?;
        self.deploy.render(out, "deployments")?;
        writeln!(out)?;
        self.destroy.render(out, "deletes")?;

        if !self.deploy.failed.is_empty() {
            writeln!(out, "\nFailed deployments:")?;
            for name in &self.deploy.failed {
                writeln!(out, "{}", name)?;
            }
        }
        if !self.destroy.failed.is_empty() {
            writeln!(out, "\nFailed deletions:")?;
            for name in &self.destroy.failed {
                writeln!(out, "{}", name)?;
            }
        }
        Ok(())
    }
}

fn fmt_optional(duration: Option<Duration>) -> String {
    duration.map(fmt_duration).unwrap_or_else(|| "N/A".to_string())
}

/// `H:MM:SS`
pub fn fmt_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, deploy: Option<u64>, destroy: Option<Option<u64>>) -> DeploymentResult {
        let mut result = DeploymentResult::new(name);
        match deploy {
            Some(secs) => result.deploy_duration = Some(Duration::from_secs(secs)),
            None => result.deploy_error = Some("boom".to_string()),
        }
        if let Some(destroy) = destroy {
            result.teardown_attempted = true;
            match destroy {
                Some(secs) => result.destroy_duration = Some(Duration::from_secs(secs)),
                None => result.destroy_error = Some("stuck".to_string()),
            }
        }
        result
    }

    #[test]
    fn test_aggregation() {
        let stats = Statistics::from_results(&[
            result("a", Some(60), Some(Some(30))),
            result("b", Some(180), Some(None)),
            result("c", None, None),
        ]);
        assert_eq!(stats.deploy.attempted(), 3);
        assert_eq!(stats.deploy.passed(), 2);
        assert_eq!(stats.deploy.failed, vec!["c".to_string()]);
        assert_eq!(stats.deploy.average(), Some(Duration::from_secs(120)));
        assert_eq!(stats.deploy.min(), Some(Duration::from_secs(60)));
        assert_eq!(stats.deploy.max(), Some(Duration::from_secs(180)));

        assert_eq!(stats.destroy.attempted(), 2);
        assert_eq!(stats.destroy.failed, vec!["b".to_string()]);
    }

    #[test]
    fn test_report_text() {
        let report = Statistics::from_results(&[result("a", Some(3725), None), result("c", None, None)])
            .with_context("Number of workers", "7")
            .report();
        assert!(report.starts_with("Number of workers: 7\n"));
        assert!(report.contains("Number of attempted deployments: 2"));
        assert!(report.contains("Average duration for success: 1:02:05"));
        assert!(report.contains("Number of attempted deletes: 0"));
        assert!(report.contains("Minimum time: N/A"));
        assert!(report.contains("Failed deployments:\nc\n"));
        assert!(!report.contains("Failed deletions"));
    }
}
