//! Cloud-automation API trait definition

use crate::error::{CamError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Remote operations a life-cycle run needs
///
/// Implementations own authentication: a 401 is answered by
/// re-authenticating once and retrying the same call once, so callers only
/// ever see [`CamError::Authentication`] when that retry also fails.
#[async_trait]
pub trait CamApi: Send + Sync {
    /// List the cloud connections visible to the tenant
    async fn cloud_connections(&self) -> Result<Vec<CloudConnection>>;

    /// Create the logical stack record
    async fn create_stack(&self, request: &StackRequest) -> Result<StackHandle>;

    /// Trigger the create (plan + apply) job of a stack record
    async fn create_action(&self, stack: &StackHandle) -> Result<StackHandle>;

    /// Fetch the current job report of a stack
    async fn retrieve(&self, stack: &StackHandle) -> Result<JobReport>;

    /// Start destroying the stack's infrastructure
    async fn destroy(&self, stack: &StackHandle) -> Result<()>;

    /// Delete the logical stack record
    async fn delete(&self, stack: &StackHandle) -> Result<()>;

    /// List every stack of the tenant
    async fn list_stacks(&self) -> Result<Vec<StackHandle>>;

    /// Import a template resource from a git source, returning its id
    async fn import_template(&self, source: &TemplateSource) -> Result<String>;

    /// Delete a template resource
    async fn delete_template(&self, template_id: &str) -> Result<()>;
}

/// A stack known to the remote service
///
/// `raw` keeps the body the service returned; the destroy call echoes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackHandle {
    pub id: String,
    pub name: String,
    #[serde(skip)]
    pub raw: Value,
}

impl StackHandle {
    pub fn from_body(body: Value) -> Result<Self> {
        let id = match body.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(CamError::Api(format!(
                    "Stack response has no 'id': {}",
                    body
                )));
            }
        };
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&id)
            .to_string();
        Ok(Self { id, name, raw: body })
    }
}

impl fmt::Display for StackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Job status reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    InProgress,
    Success,
    /// Any other value is a terminal failure
    Other(String),
}

impl JobStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "SUCCESS" => JobStatus::Success,
            "IN_PROGRESS" => JobStatus::InProgress,
            other => JobStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Other(status) => write!(f, "{}", status),
        }
    }
}

/// Parsed answer of the status endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub status: JobStatus,
    pub body: Value,
}

impl JobReport {
    pub fn from_body(body: Value) -> Result<Self> {
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .map(JobStatus::parse)
            .ok_or_else(|| CamError::Api(format!("Job report has no 'status': {}", body)))?;
        Ok(Self { status, body })
    }
}

/// A named set of provider credentials registered with the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudConnection {
    pub id: Value,
    pub name: String,
}

impl CloudConnection {
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(id) => id.clone(),
            other => other.to_string(),
        }
    }
}

/// Template format as named by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateFormat {
    #[serde(rename = "JSON")]
    Json,
    #[serde(rename = "HCL")]
    Hcl,
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateFormat::Json => write!(f, "JSON"),
            TemplateFormat::Hcl => write!(f, "HCL"),
        }
    }
}

/// Body of a stack creation request
///
/// The tenant id is added by the API implementation, which owns the session.
#[derive(Debug, Clone, Serialize)]
pub struct StackRequest {
    pub name: String,
    pub template_type: String,
    pub template_format: TemplateFormat,
    pub cloud_connection_ids: Vec<String>,
    pub template: String,
    #[serde(rename = "catalogName")]
    pub catalog_name: String,
    #[serde(rename = "catalogType")]
    pub catalog_type: String,
    #[serde(rename = "templateId", skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub parameters: Value,
}

/// Git location a template resource is imported from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSource {
    /// Source kind understood by the service, e.g. `github`
    pub kind: String,
    pub repo_url: String,
    pub dir: String,
    pub git_ref: String,
    pub token: String,
    /// Optional template type, e.g. `contentruntime`
    pub template_type: Option<String>,
}

impl TemplateSource {
    /// Request body for the import call
    pub fn to_request(&self) -> Value {
        let mut source = serde_json::Map::new();
        source.insert(
            self.kind.clone(),
            serde_json::json!({
                "url": self.repo_url,
                "dir": self.dir,
                "ref": self.git_ref,
                "token": self.token,
            }),
        );
        let mut body = serde_json::json!({
            "template_source": source,
            "template_type": "Terraform",
        });
        if let Some(template_type) = &self.template_type {
            body["type"] = Value::String(template_type.clone());
        }
        body
    }
}
