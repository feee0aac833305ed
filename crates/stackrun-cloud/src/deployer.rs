//! Stack deployment

use crate::api::{CamApi, CloudConnection, StackHandle, StackRequest};
use crate::error::{CamError, Result};
use crate::template::Template;
use crate::variables::{CamVariables, Overrides, Variables, build_parameters};
use stackrun_config::{CloudConnections, ConnectionKind};
use std::sync::Arc;

/// Everything needed to deploy one stack
#[derive(Debug, Clone)]
pub struct DeploymentInput {
    pub name: String,
    pub template: Template,
    pub variables: Variables,
    pub cam_variables: Option<CamVariables>,
    pub overrides: Overrides,
}

pub struct StackDeployer {
    api: Arc<dyn CamApi>,
    connections: CloudConnections,
}

impl StackDeployer {
    pub fn new(api: Arc<dyn CamApi>, connections: CloudConnections) -> Self {
        Self { api, connections }
    }

    /// Find the cloud connection matching the template's provider
    pub async fn cloud_connection(&self, provider: &str) -> Result<CloudConnection> {
        let kind = ConnectionKind::from_provider(provider).ok_or_else(|| {
            CamError::CloudConnection(format!("Invalid template provider {}", provider))
        })?;
        let name = self.connections.name_for(kind)?;

        self.api
            .cloud_connections()
            .await?
            .into_iter()
            .find(|connection| connection.name == name)
            .ok_or_else(|| {
                CamError::CloudConnection(format!("Cloud connection {} does not exist", name))
            })
    }

    /// Create the stack record and trigger its create job
    ///
    /// `template_id` links the stack to an imported template resource.
    pub async fn deploy(
        &self,
        input: &DeploymentInput,
        template_id: Option<&str>,
    ) -> Result<StackHandle> {
        tracing::info!("Deploying {}...", input.name);

        let connection = self.cloud_connection(&input.template.provider).await?;
        let parameters = build_parameters(
            &input.variables,
            input.cam_variables.clone(),
            &input.overrides,
        )?;

        let request = StackRequest {
            name: input.name.clone(),
            template_type: "Terraform".to_string(),
            template_format: input.template.format,
            cloud_connection_ids: vec![connection.id_string()],
            template: input.template.content.clone(),
            catalog_name: input.name.clone(),
            catalog_type: "starter".to_string(),
            template_id: template_id.map(str::to_string),
            parameters,
        };

        let stack = self.api.create_stack(&request).await?;
        tracing::debug!("Created stack record {}", stack);
        let stack = self.api.create_action(&stack).await?;
        tracing::info!("Create job started for {}", stack);
        Ok(stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TemplateFormat;
    use crate::testing::{CamErrorKind, StubApi};
    use crate::variables::VariableDecl;
    use serde_json::json;

    fn connections() -> CloudConnections {
        CloudConnections {
            aws: Some("aws-conn".to_string()),
            ibmcloud: Some("ibm-conn".to_string()),
            vmware: None,
        }
    }

    fn input(template: &str) -> DeploymentInput {
        let mut variables = Variables::new();
        variables.insert(
            "region".to_string(),
            VariableDecl {
                default: Some(json!("us-east-1")),
                ..VariableDecl::default()
            },
        );
        DeploymentInput {
            name: "s1".to_string(),
            template: Template::parse(template).unwrap(),
            variables,
            cam_variables: None,
            overrides: Overrides::new(),
        }
    }

    #[tokio::test]
    async fn test_deploy_builds_request() {
        let stub = Arc::new(StubApi::new());
        let deployer = StackDeployer::new(stub.clone(), connections());

        let stack = deployer
            .deploy(&input("provider \"aws\" {}\n"), Some("tmpl-9"))
            .await
            .unwrap();
        assert_eq!(stack.id, "stk-1");
        assert_eq!(stub.calls("create_stack"), 1);
        assert_eq!(stub.calls("create_action"), 1);

        let request = &stub.requests()[0];
        assert_eq!(request.cloud_connection_ids, vec!["42".to_string()]);
        assert_eq!(request.template_format, TemplateFormat::Hcl);
        assert_eq!(request.catalog_name, "s1");
        assert_eq!(request.template_id.as_deref(), Some("tmpl-9"));
        assert_eq!(request.parameters, json!({"region": "us-east-1"}));
    }

    #[tokio::test]
    async fn test_connection_lookup_uses_string_ids() {
        let stub = Arc::new(StubApi::new());
        let deployer = StackDeployer::new(stub.clone(), connections());

        let connection = deployer.cloud_connection("IBM Cloud").await.unwrap();
        assert_eq!(connection.id_string(), "ibm-7");
    }

    #[tokio::test]
    async fn test_provider_matching_is_exact() {
        let stub = Arc::new(StubApi::new());
        let deployer = StackDeployer::new(stub.clone(), connections());

        let err = deployer.cloud_connection("aws-gov").await.unwrap_err();
        assert!(err.to_string().contains("Invalid template provider aws-gov"));
    }

    #[tokio::test]
    async fn test_unconfigured_connection_is_an_error() {
        let stub = Arc::new(StubApi::new());
        let deployer = StackDeployer::new(stub.clone(), connections());

        let err = deployer
            .deploy(&input("provider \"vsphere\" {}\n"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CamError::Config(_)));
        assert_eq!(stub.calls("create_stack"), 0);
    }

    #[tokio::test]
    async fn test_missing_remote_connection() {
        let stub = Arc::new(StubApi::new());
        let deployer = StackDeployer::new(
            stub.clone(),
            CloudConnections {
                aws: Some("gone".to_string()),
                ..CloudConnections::default()
            },
        );
        let err = deployer.cloud_connection("aws").await.unwrap_err();
        assert!(err.to_string().contains("Cloud connection gone does not exist"));
    }

    #[tokio::test]
    async fn test_create_failure_is_deployment_error() {
        let stub = Arc::new(StubApi::new());
        stub.fail("create_stack", CamErrorKind::Api);
        let deployer = StackDeployer::new(stub.clone(), connections());

        let err = deployer
            .deploy(&input("provider \"aws\" {}\n"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CamError::Deployment { .. }));
        assert_eq!(stub.calls("create_action"), 0);
    }
}
