//! In-memory `CamApi` used by the unit tests

use crate::api::{
    CamApi, CloudConnection, JobReport, StackHandle, StackRequest, TemplateSource,
};
use crate::error::{CamError, HttpFailure, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

enum Retrieval {
    Status(String),
    Failure(u16),
    Transport,
    Auth,
}

#[derive(Default)]
pub struct StubApi {
    retrievals: Mutex<VecDeque<Retrieval>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, CamErrorKind>>,
    requests: Mutex<Vec<StackRequest>>,
    stacks: Mutex<Vec<StackHandle>>,
}

#[derive(Clone, Copy)]
pub enum CamErrorKind {
    Api,
    Auth,
}

impl StubApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_statuses(&self, statuses: &[&str]) {
        let mut queue = self.retrievals.lock().unwrap();
        queue.extend(statuses.iter().map(|s| Retrieval::Status(s.to_string())));
    }

    pub fn push_retrieve_failure(&self, status: u16) {
        self.retrievals
            .lock()
            .unwrap()
            .push_back(Retrieval::Failure(status));
    }

    pub fn push_retrieve_transport_error(&self) {
        self.retrievals.lock().unwrap().push_back(Retrieval::Transport);
    }

    pub fn push_retrieve_auth_error(&self) {
        self.retrievals.lock().unwrap().push_back(Retrieval::Auth);
    }

    /// Make every call of `operation` fail
    pub fn fail(&self, operation: &'static str, kind: CamErrorKind) {
        self.failures.lock().unwrap().insert(operation, kind);
    }

    pub fn add_stack(&self, id: &str, name: &str) {
        self.stacks
            .lock()
            .unwrap()
            .push(StackHandle::from_body(json!({"id": id, "name": name})).unwrap());
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<StackRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        match self.failures.lock().unwrap().get(operation) {
            Some(CamErrorKind::Api) => Err(CamError::Api(format!("{} failed", operation))),
            Some(CamErrorKind::Auth) => Err(CamError::Authentication(format!(
                "{} rejected twice",
                operation
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CamApi for StubApi {
    async fn cloud_connections(&self) -> Result<Vec<CloudConnection>> {
        self.record("cloud_connections")?;
        Ok(vec![
            CloudConnection {
                id: json!(42),
                name: "aws-conn".to_string(),
            },
            CloudConnection {
                id: json!("ibm-7"),
                name: "ibm-conn".to_string(),
            },
        ])
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<StackHandle> {
        self.requests.lock().unwrap().push(request.clone());
        if let Err(e) = self.record("create_stack") {
            return Err(match e {
                CamError::Api(detail) => CamError::Deployment {
                    stack: request.name.clone(),
                    detail,
                },
                other => other,
            });
        }
        StackHandle::from_body(json!({"id": "stk-1", "name": request.name}))
    }

    async fn create_action(&self, stack: &StackHandle) -> Result<StackHandle> {
        self.record("create_action")?;
        Ok(stack.clone())
    }

    async fn retrieve(&self, stack: &StackHandle) -> Result<JobReport> {
        self.record("retrieve")?;
        let next = self.retrievals.lock().unwrap().pop_front();
        match next.unwrap_or(Retrieval::Status("SUCCESS".to_string())) {
            Retrieval::Status(status) => {
                JobReport::from_body(json!({"id": stack.id, "status": status}))
            }
            Retrieval::Failure(status) => Err(CamError::UnexpectedStatus(HttpFailure {
                method: "GET".to_string(),
                url: format!("https://cam.test/stacks/{}/retrieve", stack.id),
                status,
                response_headers: String::new(),
                response_body: "bad gateway".to_string(),
                request_body: None,
            })),
            Retrieval::Transport => Err(CamError::Transport("connection reset".to_string())),
            Retrieval::Auth => Err(CamError::Authentication("retrieve".to_string())),
        }
    }

    async fn destroy(&self, _stack: &StackHandle) -> Result<()> {
        self.record("destroy")
    }

    async fn delete(&self, _stack: &StackHandle) -> Result<()> {
        self.record("delete")
    }

    async fn list_stacks(&self) -> Result<Vec<StackHandle>> {
        self.record("list_stacks")?;
        Ok(self.stacks.lock().unwrap().clone())
    }

    async fn import_template(&self, _source: &TemplateSource) -> Result<String> {
        self.record("import_template")?;
        Ok("tmpl-1".to_string())
    }

    async fn delete_template(&self, _template_id: &str) -> Result<()> {
        self.record("delete_template")
    }
}
