//! Authentication against the identity service
//!
//! Hosted targets log in through the Cloud Foundry UAA (`/info` then
//! `oauth/token`) and resolve organization, space and tenant by name.
//! On-prem targets exchange credentials at the identity-token endpoint and
//! take the tenant and its `default` namespace from `getTenantOnPrem`.

use crate::error::transport;
use crate::session::{BearerToken, Session};
use reqwest::RequestBuilder;
use reqwest::header::ACCEPT;
use serde_json::{Value, json};
use stackrun_cloud::retry::{RetryConfig, retry};
use stackrun_cloud::{CamError, Result};
use stackrun_config::{Credentials, Endpoints};

/// Region used for the organization lookup
const REGION: &str = "us-south";

/// Organization id on-prem installations expect
const ON_PREM_ORG: &str = "dummy-org-id";

pub struct Authenticator {
    http: reqwest::Client,
    endpoints: Endpoints,
    credentials: Credentials,
    retry: RetryConfig,
}

impl Authenticator {
    pub fn new(http: reqwest::Client, endpoints: Endpoints, credentials: Credentials) -> Self {
        Self {
            http,
            endpoints,
            credentials,
            retry: RetryConfig::authentication(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Obtain a fresh session
    pub async fn authenticate(&self) -> Result<Session> {
        if self.credentials.username().is_empty() || self.credentials.password().is_empty() {
            return Err(CamError::Authentication(
                "username and password must be set to non-empty values".to_string(),
            ));
        }

        match &self.credentials {
            Credentials::Hosted {
                org_name,
                space_name,
                ..
            } => self.authenticate_hosted(org_name, space_name).await,
            Credentials::OnPrem { .. } => self.authenticate_on_prem().await,
        }
    }

    async fn authenticate_hosted(&self, org_name: &str, space_name: &str) -> Result<Session> {
        tracing::info!(
            "Logging into {} as {}...",
            self.endpoints.auth_host,
            self.credentials.username()
        );
        let token = retry(&self.retry, "Token exchange", || self.hosted_token()).await?;

        let org_query = format!("name:{}", org_name);
        let orgs = self
            .fetch(
                "organization lookup",
                self.authorized(
                    self.http
                        .get(format!("{}/v2/organizations", self.endpoints.auth_host)),
                    &token,
                )
                .query(&[("region", REGION), ("q", org_query.as_str())]),
            )
            .await?;
        let org_guid = first_guid(&orgs, "org", org_name)?;

        let spaces = self
            .fetch(
                "space lookup",
                self.authorized(
                    self.http.get(format!(
                        "{}/v2/organizations/{}/spaces",
                        self.endpoints.auth_host, org_guid
                    )),
                    &token,
                )
                .query(&[("q", format!("name:{}", space_name))]),
            )
            .await?;
        let space_guid = first_guid(&spaces, "space", space_name)?;

        let tenant_id = self.hosted_tenant(&token, &org_guid, &space_guid).await?;
        tracing::debug!("Authenticated: org {} space {} tenant {}", org_guid, space_guid, tenant_id);

        Ok(Session {
            token,
            org_guid,
            space_guid: Some(space_guid),
            tenant_id: Some(tenant_id),
        })
    }

    async fn hosted_token(&self) -> Result<BearerToken> {
        let info = self
            .fetch(
                "identity info",
                self.http.get(format!("{}/info", self.endpoints.auth_host)),
            )
            .await?;
        let endpoint = info
            .get("authorization_endpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CamError::Authentication(format!("No authorization_endpoint in {}", info))
            })?;

        let request = self
            .http
            .post(format!("{}/oauth/token", endpoint.trim_end_matches('/')))
            .basic_auth("cf", Some(""))
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username()),
                ("password", self.credentials.password()),
            ]);
        parse_token(self.fetch("oauth/token", request).await?)
    }

    /// Tenant of the CAM service instance living in `space_guid`
    async fn hosted_tenant(
        &self,
        token: &BearerToken,
        org_guid: &str,
        space_guid: &str,
    ) -> Result<String> {
        let dashboard = self.endpoints.dashboard.as_deref().ok_or_else(|| {
            CamError::Authentication("No service dashboard configured for this target".to_string())
        })?;

        let instances = self
            .fetch(
                "service instance lookup",
                self.authorized(
                    self.http
                        .get(format!("{}/v2/service_instances", self.endpoints.auth_host)),
                    token,
                ),
            )
            .await?;
        let service_id = instances
            .get("resources")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|resource| {
                resource["entity"]["dashboard_url"] == dashboard
                    && resource["entity"]["space_guid"] == space_guid
            })
            .and_then(|resource| resource["metadata"]["guid"].as_str())
            .ok_or_else(|| {
                CamError::Authentication(format!(
                    "No service instance with dashboard {} in space {}",
                    dashboard, space_guid
                ))
            })?
            .to_string();

        let tenant = self
            .fetch(
                "tenant lookup",
                self.authorized(
                    self.http.get(format!(
                        "{}/tenants/findTenantByOrgSpaceServiceId",
                        self.endpoints.tenant_host
                    )),
                    token,
                )
                .query(&[
                    ("organizationId", org_guid),
                    ("spaceId", space_guid),
                    ("serviceId", service_id.as_str()),
                ]),
            )
            .await?;
        string_field(&tenant, "id", "tenant")
    }

    async fn authenticate_on_prem(&self) -> Result<Session> {
        tracing::info!(
            "Logging into {} as {}...",
            self.endpoints.auth_host,
            self.credentials.username()
        );
        let token = retry(&self.retry, "Token exchange", || async {
            let request = self.http.post(&self.endpoints.auth_host).json(&json!({
                "grant_type": "password",
                "username": self.credentials.username(),
                "password": self.credentials.password(),
                "scope": "openid",
            }));
            parse_token(self.fetch("identity token", request).await?)
        })
        .await?;

        let tenant = self
            .fetch(
                "tenant lookup",
                self.authorized(
                    self.http
                        .get(format!("{}/tenants/getTenantOnPrem", self.endpoints.tenant_host)),
                    &token,
                ),
            )
            .await?;
        let tenant_id = string_field(&tenant, "id", "tenant")?;
        let space_guid = tenant
            .get("namespaces")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|namespace| namespace["name"] == "default")
            .and_then(|namespace| namespace["uid"].as_str())
            .map(str::to_string);
        if space_guid.is_none() {
            tracing::warn!("Tenant {} has no 'default' namespace", tenant_id);
        }

        Ok(Session {
            token,
            org_guid: ON_PREM_ORG.to_string(),
            space_guid,
            tenant_id: Some(tenant_id),
        })
    }

    fn authorized(&self, request: RequestBuilder, token: &BearerToken) -> RequestBuilder {
        request
            .header(reqwest::header::AUTHORIZATION, token.header_value())
            .header(ACCEPT, "application/json")
    }

    /// Send an identity request; a non-2xx answer is an authentication failure
    async fn fetch(&self, what: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            let msg = format!(
                "Failed to get {}, status code is {}\nresponse:\n{}",
                what,
                status.as_u16(),
                body
            );
            tracing::error!("{}", msg);
            return Err(CamError::Authentication(msg));
        }
        serde_json::from_str(&body)
            .map_err(|e| CamError::Authentication(format!("Invalid {} response: {}", what, e)))
    }
}

fn parse_token(body: Value) -> Result<BearerToken> {
    serde_json::from_value(body)
        .map_err(|e| CamError::Authentication(format!("Invalid token response: {}", e)))
}

fn string_field(body: &Value, field: &str, what: &str) -> Result<String> {
    match body.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CamError::Authentication(format!(
            "Can't find '{}' for {} in output: {}",
            field, what, body
        ))),
    }
}

fn first_guid(body: &Value, what: &str, name: &str) -> Result<String> {
    find_key(body, "guid")
        .into_iter()
        .find_map(|guid| guid.as_str().map(str::to_string))
        .ok_or_else(|| {
            CamError::Authentication(format!(
                "Can't find 'guid' for {} {} in output: {}",
                what, name, body
            ))
        })
}

/// Every value stored under `key`, depth first; an object holding `key`
/// is not searched any deeper
pub fn find_key<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(|item| find_key(item, key)).collect(),
        Value::Object(map) => match map.get(key) {
            Some(found) => vec![found],
            None => map.values().flat_map(|v| find_key(v, key)).collect(),
        },
        _ => Vec::new(),
    }
}
