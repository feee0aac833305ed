//! Life-cycle orchestration
//!
//! One run is strictly sequential: optional template import, deploy, wait,
//! then (policy permitting) destroy, wait, delete, and finally removal of the
//! imported template. Every failure except an authentication failure is
//! recorded in the returned [`DeploymentResult`]. An authentication failure
//! skips the teardown but the imported template is still removed.

use crate::api::{CamApi, StackHandle, TemplateSource};
use crate::deployer::{DeploymentInput, StackDeployer};
use crate::error::{CamError, Result};
use crate::poller::StatusPoller;
use crate::result::DeploymentResult;
use crate::teardown::TeardownSequencer;
use chrono::Utc;
use stackrun_config::{CloudConnections, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Timing and policy switches of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub poll_interval: Duration,
    pub deploy_timeout: Duration,
    pub destroy_timeout: Duration,
    pub settle_delay: Duration,
    /// Tear down a deployment whose job failed instead of keeping it for debugging
    pub delete_failed_deployment: bool,
    /// Tear down a successful deployment
    pub autodestroy: bool,
}

impl LifecycleOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            deploy_timeout: settings.job_timeout(),
            destroy_timeout: settings.job_timeout(),
            settle_delay: settings.settle_delay(),
            delete_failed_deployment: false,
            autodestroy: true,
        }
    }
}

/// What to deploy, and where its template resource comes from
#[derive(Debug, Clone)]
pub struct LifecycleRequest {
    pub input: DeploymentInput,
    /// Import a template resource from git before deploying
    pub template_source: Option<TemplateSource>,
    /// Pre-existing template resource; never deleted by the run
    pub template_id: Option<String>,
}

pub struct Lifecycle {
    api: Arc<dyn CamApi>,
    deployer: StackDeployer,
    poller: StatusPoller,
    teardown: TeardownSequencer,
    options: LifecycleOptions,
}

/// How far the deploy phase got
#[derive(Default)]
struct DeployProgress {
    stack: Option<StackHandle>,
    imported_template: Option<String>,
    /// The deploy job reached SUCCESS or a failed status
    terminal: bool,
}

impl Lifecycle {
    pub fn new(api: Arc<dyn CamApi>, connections: CloudConnections, options: LifecycleOptions) -> Self {
        Self {
            deployer: StackDeployer::new(api.clone(), connections),
            poller: StatusPoller::new(api.clone(), options.poll_interval),
            teardown: TeardownSequencer::new(api.clone(), options.poll_interval, options.settle_delay),
            api,
            options,
        }
    }

    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    /// Run one life-cycle and report its timings and errors
    ///
    /// Returns `Err` only for authentication failures.
    pub async fn run(&self, request: &LifecycleRequest) -> Result<DeploymentResult> {
        let name = &request.input.name;
        let mut result = DeploymentResult::new(name.clone());
        let mut delete_deployment = self.options.autodestroy;
        tracing::info!(
            stack = %name,
            delete_failed_deployment = self.options.delete_failed_deployment,
            autodestroy = self.options.autodestroy,
            "Starting life-cycle"
        );

        let mut progress = DeployProgress::default();
        let mut auth_error = None;
        result.deploy_start_time = Some(Utc::now());
        let started = Instant::now();

        match self.deploy_phase(request, &mut progress).await {
            Ok(()) => {
                result.deploy_end_time = Some(Utc::now());
                result.deploy_duration = Some(started.elapsed());
                tracing::info!("Deployed {} in {:?}", name, started.elapsed());
            }
            Err(e) if e.is_authentication() => {
                tracing::warn!("Authentication error during deploy of {}: {}", name, e);
                auth_error = Some(e);
            }
            Err(e) => {
                tracing::error!("Failed to deploy the template: stack name: {}: {}", name, e);
                if matches!(e, CamError::PollTimeout { .. }) {
                    tracing::warn!("Deploy job of {} never finished, leaving the stack in place", name);
                }
                result.deploy_error = Some(e.to_string());
                if !self.options.delete_failed_deployment {
                    // keep the failed deployment for debugging
                    delete_deployment = false;
                }
            }
        }

        let teardown_stack = progress
            .stack
            .as_ref()
            .filter(|_| progress.terminal && auth_error.is_none());
        if let Some(stack) = teardown_stack {
            if delete_deployment {
                result.teardown_attempted = true;
                self.teardown.settle().await;
                result.destroy_start_time = Some(Utc::now());
                let started = Instant::now();

                match self
                    .teardown
                    .destroy_and_delete(stack, self.options.destroy_timeout)
                    .await
                {
                    Ok(()) => {
                        result.destroy_end_time = Some(Utc::now());
                        result.destroy_duration = Some(started.elapsed());
                    }
                    Err(e) if e.is_authentication() => {
                        tracing::warn!("Authentication error during teardown of {}: {}", stack, e);
                        auth_error = Some(e);
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to delete/destroy the template {}; stack name: {}: {}",
                            stack.name,
                            name,
                            e
                        );
                        result.destroy_error = Some(e.to_string());
                    }
                }
            }
        }

        if let Some(template_id) = &progress.imported_template {
            match self.api.delete_template(template_id).await {
                Ok(()) => tracing::info!("Deleted template {}", template_id),
                Err(e) => {
                    tracing::error!("Failed to delete the template {}: {}", template_id, e);
                    result.template_error = Some(e.to_string());
                    if e.is_authentication() && auth_error.is_none() {
                        auth_error = Some(e);
                    }
                }
            }
        }

        match auth_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    async fn deploy_phase(
        &self,
        request: &LifecycleRequest,
        progress: &mut DeployProgress,
    ) -> Result<()> {
        let template_id = match (&request.template_id, &request.template_source) {
            (Some(id), _) => Some(id.clone()),
            (None, Some(source)) => {
                tracing::info!("Importing template from {} ({})", source.repo_url, source.dir);
                let id = self.api.import_template(source).await?;
                progress.imported_template = Some(id.clone());
                Some(id)
            }
            (None, None) => None,
        };

        let stack = self
            .deployer
            .deploy(&request.input, template_id.as_deref())
            .await?;
        progress.stack = Some(stack.clone());

        let outcome = self
            .poller
            .wait_for_success(&stack, self.options.deploy_timeout)
            .await;
        progress.terminal = matches!(outcome, Ok(_) | Err(CamError::JobFailed { .. }));
        outcome.map(|_| ())
    }
}
