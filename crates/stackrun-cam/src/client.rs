//! CAM REST client
//!
//! Every call carries the session's bearer token and the org/space/tenant
//! query parameters. A 401 answer triggers one re-authentication and one
//! retry of the same call.

use crate::auth::Authenticator;
use crate::error::{Exchange, render_headers, transport};
use crate::session::Session;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::{Value, json};
use stackrun_cloud::{
    CamApi, CamError, CloudConnection, JobReport, Result, StackHandle, StackRequest,
    TemplateSource,
};
use stackrun_config::Config;
use tokio::sync::RwLock;

pub struct CamClient {
    http: reqwest::Client,
    base_url: String,
    auth: Authenticator,
    session: RwLock<Session>,
}

impl CamClient {
    /// Build the HTTP client for `config` and log in
    pub async fn connect(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.settings.request_timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(transport)?;
        let auth = Authenticator::new(
            http.clone(),
            config.endpoints.clone(),
            config.credentials.clone(),
        );
        let session = auth.authenticate().await?;
        tracing::info!("Authenticated against {}", config.target);
        Ok(Self::with_session(
            http,
            config.endpoints.iaas_host.clone(),
            auth,
            session,
        ))
    }

    /// Client over an already established session
    pub fn with_session(
        http: reqwest::Client,
        base_url: String,
        auth: Authenticator,
        session: Session,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            session: RwLock::new(session),
        }
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// Send one API call, re-authenticating once on 401
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Exchange> {
        let mut reauthenticated = false;
        loop {
            let exchange = self.send_once(method.clone(), path, body).await?;
            if exchange.status != 401 {
                return Ok(exchange);
            }
            if reauthenticated {
                return Err(CamError::Authentication(format!(
                    "still unauthorized after re-authenticating, {}",
                    exchange.failure()
                )));
            }

            tracing::warn!(
                "{} {} answered 401, re-authenticating",
                exchange.method,
                exchange.url
            );
            let session = self.auth.authenticate().await?;
            *self.session.write().await = session;
            reauthenticated = true;
        }
    }

    async fn send_once(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Exchange> {
        let url = format!("{}{}", self.base_url, path);
        let (authorization, params) = {
            let session = self.session.read().await;
            (session.token.header_value(), session.query_params())
        };

        let mut request = self
            .http
            .request(method.clone(), &url)
            .query(&params)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!("{} {}", method, url);
        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let response_headers = render_headers(response.headers());
        let response_body = response.text().await.map_err(transport)?;
        tracing::trace!("{} {} -> {}", method, url, status);

        Ok(Exchange {
            method: method.to_string(),
            url,
            status,
            response_headers,
            response_body,
            request_body: body.map(Value::to_string),
        })
    }
}

/// Body echoed back by the create and destroy actions
fn stack_body(stack: &StackHandle) -> Value {
    if stack.raw.is_null() {
        json!({"id": stack.id, "name": stack.name})
    } else {
        stack.raw.clone()
    }
}

fn deployment_error(stack: &str) -> impl FnOnce(stackrun_cloud::HttpFailure) -> CamError + '_ {
    move |failure| CamError::Deployment {
        stack: stack.to_string(),
        detail: failure.to_string(),
    }
}

fn teardown_error(stack: &StackHandle) -> impl FnOnce(stackrun_cloud::HttpFailure) -> CamError + '_ {
    move |failure| CamError::Teardown {
        stack: stack.to_string(),
        detail: failure.to_string(),
    }
}

#[async_trait]
impl CamApi for CamClient {
    async fn cloud_connections(&self) -> Result<Vec<CloudConnection>> {
        let body = self
            .send(Method::GET, "/cloudconnections", None)
            .await?
            .into_json(|failure| {
                CamError::CloudConnection(format!("Failed to list cloud connections, {}", failure))
            })?;
        serde_json::from_value(body).map_err(|e| {
            CamError::CloudConnection(format!("Invalid cloud connection list: {}", e))
        })
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<StackHandle> {
        let mut body = serde_json::to_value(request)?;
        if let Some(tenant_id) = self.session.read().await.tenant_id.clone() {
            body["tenantId"] = Value::String(tenant_id);
        }

        let created = self
            .send(Method::POST, "/stacks", Some(&body))
            .await?
            .into_json(deployment_error(&request.name))?;
        let stack = StackHandle::from_body(created)?;
        tracing::info!("Created stack {}", stack);
        Ok(stack)
    }

    async fn create_action(&self, stack: &StackHandle) -> Result<StackHandle> {
        let path = format!("/stacks/{}/create", stack.id);
        let body = self
            .send(Method::POST, &path, Some(&stack_body(stack)))
            .await?
            .into_json(deployment_error(&stack.name))?;
        // some versions answer with the job rather than the stack
        match StackHandle::from_body(body) {
            Ok(updated) if updated.id == stack.id => Ok(updated),
            _ => Ok(stack.clone()),
        }
    }

    async fn retrieve(&self, stack: &StackHandle) -> Result<JobReport> {
        let path = format!("/stacks/{}/retrieve", stack.id);
        let body = self
            .send(Method::POST, &path, None)
            .await?
            .into_json(CamError::UnexpectedStatus)?;
        JobReport::from_body(body)
    }

    async fn destroy(&self, stack: &StackHandle) -> Result<()> {
        let path = format!("/stacks/{}/delete", stack.id);
        self.send(Method::POST, &path, Some(&stack_body(stack)))
            .await?
            .ok_or(teardown_error(stack))
    }

    async fn delete(&self, stack: &StackHandle) -> Result<()> {
        let path = format!("/stacks/{}", stack.id);
        self.send(Method::DELETE, &path, None)
            .await?
            .ok_or(teardown_error(stack))
    }

    async fn list_stacks(&self) -> Result<Vec<StackHandle>> {
        let body = self
            .send(Method::GET, "/stacks", None)
            .await?
            .into_json(|failure| CamError::Api(format!("Failed to list stacks, {}", failure)))?;
        match body {
            Value::Array(items) => items.into_iter().map(StackHandle::from_body).collect(),
            other => Err(CamError::Api(format!("Expected a stack list, got {}", other))),
        }
    }

    async fn import_template(&self, source: &TemplateSource) -> Result<String> {
        let body = self
            .send(
                Method::POST,
                "/templates/createFromSource",
                Some(&source.to_request()),
            )
            .await?
            .into_json(|failure| {
                CamError::Template(format!(
                    "Failed to import template from {}, {}",
                    source.repo_url, failure
                ))
            })?;
        match body.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(CamError::Template(format!(
                "Imported template has no 'id': {}",
                body
            ))),
        }
    }

    async fn delete_template(&self, template_id: &str) -> Result<()> {
        let path = format!("/templates/{}", template_id);
        self.send(Method::DELETE, &path, None)
            .await?
            .ok_or(|failure| {
                CamError::Api(format!("Failed to delete template {}, {}", template_id, failure))
            })
    }
}
