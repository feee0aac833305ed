//! Retry policies
//!
//! Two layers: [`retry`] re-runs an async operation with exponential backoff
//! while it fails with a transient (network level) error, and
//! [`run_retryable_command`] re-runs a shell command with a fixed wait while
//! its output mentions a connection failure.

use crate::error::{CamError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::process::Command;

/// Output phrases that mark a command failure as worth retrying
pub const CONNECTION_FAILURES: [&str; 6] = [
    "EHOSTUNREACH",
    "Could not resolve host",
    "No route to host",
    "Connection refused",
    "Authentication failed for user",
    "ConnectionTimeout",
];

pub const COMMAND_ATTEMPTS: u32 = 20;
pub const COMMAND_WAIT: Duration = Duration::from_secs(10);

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Token exchange: 5 attempts, 2s base, 10s cap
    pub fn authentication() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Job status retrieval: 10 attempts, 1s base, 10s cap
    pub fn status_retrieval() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            ..Self::default()
        }
    }

    /// Delay after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// the attempts are exhausted
pub async fn retry<T, F, Fut>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt,
                    config.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exit code and trimmed output of a finished shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn mentions_any(&self, phrases: &[&str]) -> bool {
        phrases
            .iter()
            .any(|phrase| self.stdout.contains(phrase) || self.stderr.contains(phrase))
    }
}

/// Run a shell command once
pub async fn run_command(cmd: &str) -> Result<CommandOutput> {
    tracing::debug!("Executing cmd --> {}", cmd);
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .await
        .map_err(|e| CamError::Command(format!("Failed to spawn '{}': {}", cmd, e)))?;

    let result = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    tracing::debug!(
        "cmd results: rc = {:?}\n\tstdout --> {}\n\tstderr --> {}",
        result.code,
        result.stdout,
        result.stderr
    );
    Ok(result)
}

/// Run a shell command, retrying with a fixed `wait` while its output
/// contains one of `retry_if_contains`
///
/// The last output is returned whatever its exit code; callers decide what a
/// failure means.
pub async fn run_retryable_command(
    cmd: &str,
    retry_if_contains: &[&str],
    attempts: u32,
    wait: Duration,
) -> Result<CommandOutput> {
    let phrases = if retry_if_contains.is_empty() {
        &CONNECTION_FAILURES[..]
    } else {
        retry_if_contains
    };

    let mut attempt = 1;
    loop {
        let output = run_command(cmd).await?;
        if !output.mentions_any(phrases) || attempt >= attempts.max(1) {
            return Ok(output);
        }
        tracing::debug!("Retrying command ({}/{})", attempt, attempts);
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
