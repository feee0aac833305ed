//! Stack life-cycle orchestration
//!
//! This crate drives a cloud-automation service through the life-cycle of a
//! Terraform stack: deploy, wait for the job, destroy, wait, delete. The
//! service itself sits behind the [`CamApi`] trait; `stackrun-cam` provides
//! the HTTP implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  stackrun CLI                   │
//! │             (run / suite / clean)               │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                stackrun-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Lifecycle                               │   │
//! │  │   StackDeployer → StatusPoller →         │   │
//! │  │   TeardownSequencer                      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │  Variables   │  │ Suite files  │             │
//! │  └──────────────┘  └──────────────┘             │
//! └─────────────────┬───────────────────────────────┘
//!                   │ trait CamApi
//! ┌─────────────────▼───────────────────────────────┐
//! │          stackrun-cam (reqwest client)          │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod deployer;
pub mod error;
pub mod lifecycle;
pub mod poller;
pub mod result;
pub mod retry;
pub mod stats;
pub mod suite;
pub mod teardown;
pub mod template;
pub mod variables;

#[cfg(test)]
mod testing;

// Re-exports
pub use api::{
    CamApi, CloudConnection, JobReport, JobStatus, StackHandle, StackRequest, TemplateFormat,
    TemplateSource,
};
pub use deployer::{DeploymentInput, StackDeployer};
pub use error::{CamError, HttpFailure, Result};
pub use lifecycle::{Lifecycle, LifecycleOptions, LifecycleRequest};
pub use poller::{StatusPoller, max_polls};
pub use result::DeploymentResult;
pub use retry::{CONNECTION_FAILURES, RetryConfig, retry, run_retryable_command};
pub use stats::Statistics;
pub use suite::{CaseStatus, SuiteDir, SuiteSummary, TestCase};
pub use teardown::{CleanSummary, TeardownSequencer};
pub use template::Template;
pub use variables::{CamVariables, Overrides, VariableDecl, Variables};
