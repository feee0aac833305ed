//! Job status polling

use crate::api::{CamApi, JobReport, JobStatus, StackHandle};
use crate::error::{CamError, Result};
use crate::retry::{RetryConfig, retry};
use std::sync::Arc;
use std::time::Duration;

/// Number of polls a wall-clock `budget` allows at `interval`
///
/// Always at least one, so a zero budget still looks at the job once.
pub fn max_polls(budget: Duration, interval: Duration) -> u64 {
    let interval = interval.as_millis().max(1);
    let polls = budget.as_millis().div_ceil(interval);
    polls.clamp(1, u64::MAX as u128) as u64
}

/// Polls a stack's job until it reaches a terminal status
pub struct StatusPoller {
    api: Arc<dyn CamApi>,
    interval: Duration,
    retry: RetryConfig,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn CamApi>, interval: Duration) -> Self {
        Self {
            api,
            interval,
            retry: RetryConfig::status_retrieval(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until the job of `stack` reports `SUCCESS`
    ///
    /// Any other terminal status fails at once with [`CamError::JobFailed`].
    /// After `max_polls(budget, interval)` in-progress polls the wait fails
    /// with [`CamError::PollTimeout`].
    pub async fn wait_for_success(&self, stack: &StackHandle, budget: Duration) -> Result<JobReport> {
        let limit = max_polls(budget, self.interval);
        let api = self.api.as_ref();
        let mut polls = 0u64;

        loop {
            polls += 1;
            let outcome = retry(&self.retry, "Retrieving job status", move || {
                api.retrieve(stack)
            })
            .await;

            match outcome {
                Ok(report) => match &report.status {
                    JobStatus::Success => {
                        tracing::info!("Job for {} succeeded after {} poll(s)", stack, polls);
                        return Ok(report);
                    }
                    JobStatus::Other(status) => {
                        tracing::error!("Job for {} failed: {}", stack, report.body);
                        return Err(CamError::JobFailed {
                            stack_id: stack.id.clone(),
                            status: status.clone(),
                        });
                    }
                    JobStatus::InProgress => {
                        tracing::debug!("Job for {} in progress ({}/{})", stack, polls, limit);
                    }
                },
                // counted as an in-progress poll
                Err(CamError::UnexpectedStatus(failure)) => {
                    tracing::warn!(
                        "Invalid status response for {} ({}/{}): {}",
                        stack,
                        polls,
                        limit,
                        failure
                    );
                }
                Err(e) => return Err(e),
            }

            if polls >= limit {
                return Err(CamError::PollTimeout {
                    stack_id: stack.id.clone(),
                    timeout: budget,
                });
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
