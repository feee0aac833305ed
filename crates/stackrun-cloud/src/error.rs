//! Life-cycle error taxonomy

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A non-2xx HTTP exchange, captured for diagnosis
///
/// Request headers are never captured: they carry the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub response_headers: String,
    pub response_body: String,
    pub request_body: Option<String>,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status code is {}\nresponse headers:\n{}\nresponse:\n{}\n\nrequest url:\n{} {}",
            self.status, self.response_headers, self.response_body, self.method, self.url
        )?;
        if let Some(body) = &self.request_body {
            write!(f, "\nrequest body:\n{}", body)?;
        }
        Ok(())
    }
}

/// Cloud-automation errors
#[derive(Error, Debug)]
pub enum CamError {
    /// Bad or expired credentials that survived the re-authentication retry
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to deploy {stack}: {detail}")]
    Deployment { stack: String, detail: String },

    #[error("The job for stack {stack_id} did not complete in {}s", .timeout.as_secs())]
    PollTimeout { stack_id: String, timeout: Duration },

    #[error("Job for stack id {stack_id} failed with status {status}")]
    JobFailed { stack_id: String, status: String },

    #[error("Failed to destroy/delete {stack}: {detail}")]
    Teardown { stack: String, detail: String },

    /// Non-2xx answer from the job status endpoint
    #[error("Invalid response from the status endpoint, {0}")]
    UnexpectedStatus(HttpFailure),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Variable error: {0}")]
    Variable(String),

    #[error("Invalid template: {0}")]
    Template(String),

    #[error("Cloud connection error: {0}")]
    CloudConnection(String),

    #[error("Suite error: {0}")]
    Suite(String),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Invalid configuration: {0}")]
    Config(stackrun_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<stackrun_config::ConfigError> for CamError {
    /// Missing credentials are an authentication failure
    fn from(err: stackrun_config::ConfigError) -> Self {
        match err {
            stackrun_config::ConfigError::MissingEnvVar(_) => {
                CamError::Authentication(err.to_string())
            }
            other => CamError::Config(other),
        }
    }
}

impl CamError {
    /// Authentication failures signal a broken session, not a failed deployment
    pub fn is_authentication(&self) -> bool {
        matches!(self, CamError::Authentication(_))
    }

    /// Errors worth retrying with backoff (network level only)
    pub fn is_transient(&self) -> bool {
        matches!(self, CamError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, CamError>;
