//! Stack teardown: destroy, wait for the destroy job, delete

use crate::api::{CamApi, StackHandle};
use crate::error::Result;
use crate::poller::StatusPoller;
use std::sync::Arc;
use std::time::Duration;

pub struct TeardownSequencer {
    api: Arc<dyn CamApi>,
    poller: StatusPoller,
    settle_delay: Duration,
}

/// Outcome of a prefix clean-up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl TeardownSequencer {
    pub fn new(api: Arc<dyn CamApi>, poll_interval: Duration, settle_delay: Duration) -> Self {
        Self {
            poller: StatusPoller::new(api.clone(), poll_interval),
            api,
            settle_delay,
        }
    }

    /// Let the service settle after a deploy, then destroy and delete
    pub async fn teardown(&self, stack: &StackHandle, budget: Duration) -> Result<()> {
        self.settle().await;
        self.destroy_and_delete(stack, budget).await
    }

    /// Sleep for the settle delay
    pub async fn settle(&self) {
        if !self.settle_delay.is_zero() {
            tracing::debug!("Waiting {:?} before destroying", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }
    }

    pub async fn destroy_and_delete(&self, stack: &StackHandle, budget: Duration) -> Result<()> {
        tracing::info!("Destroying {}", stack);
        self.api.destroy(stack).await?;
        self.poller.wait_for_success(stack, budget).await?;
        tracing::info!("Successfully destroyed {}", stack);

        tracing::info!("Deleting {}", stack);
        self.api.delete(stack).await?;
        tracing::info!("Successfully deleted {}", stack);
        Ok(())
    }

    /// Destroy and delete every stack whose name starts with `prefix`
    ///
    /// A failing stack is logged and skipped; only an authentication error
    /// stops the sweep.
    pub async fn clean(&self, prefix: &str, budget: Duration) -> Result<CleanSummary> {
        let mut summary = CleanSummary::default();
        for stack in self.api.list_stacks().await? {
            if !stack.name.starts_with(prefix) {
                continue;
            }
            match self.destroy_and_delete(&stack, budget).await {
                Ok(()) => summary.removed.push(stack.name),
                Err(e) if e.is_authentication() => return Err(e),
                Err(e) => {
                    tracing::error!("Failed to delete/destroy stack {}: {}", stack.name, e);
                    summary.failed.push(stack.name);
                }
            }
        }
        Ok(summary)
    }
}
