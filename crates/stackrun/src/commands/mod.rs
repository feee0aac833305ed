pub mod clean;
pub mod run;
pub mod suite;

use anyhow::Context;
use clap::Args;
use stackrun_cam::CamClient;
use stackrun_cloud::CamError;
use stackrun_config::{CloudConnections, Config, HostedEnv, Target};
use std::sync::Arc;

/// Which CAM service to talk to
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Hosted environment (dev, qa, pen, prod)
    #[arg(short, long, env = "ENV", default_value = "prod")]
    pub env: String,

    /// Staging infix of the hosted endpoints
    #[arg(long, env = "STAGE1")]
    pub stage1: Option<String>,

    /// On-prem installation as host[:port]; takes precedence over --env
    #[arg(long, env = "CAM_URL")]
    pub cam_url: Option<String>,
}

impl TargetArgs {
    pub fn target(&self) -> anyhow::Result<Target> {
        match &self.cam_url {
            Some(address) => Ok(Target::on_prem(address)?),
            None => {
                let environment: HostedEnv = self.env.parse()?;
                Ok(Target::hosted(environment, self.stage1.clone()))
            }
        }
    }

    /// Resolve the configuration; credentials come from the environment
    ///
    /// Missing credentials fail as an authentication error.
    pub fn config(&self, connections: CloudConnections) -> anyhow::Result<Config> {
        let target = self.target()?;
        Config::from_env(target, connections)
            .map_err(CamError::from)
            .context("Failed to load configuration")
    }
}

/// Cloud connection names per provider; unset ones fall back to
/// `AWS_CLOUD_CONNECTION`, `IBMCLOUD_CLOUD_CONNECTION`, `VMWARE_CLOUD_CONNECTION`
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    #[arg(long)]
    pub aws: Option<String>,
    #[arg(long)]
    pub ibmcloud: Option<String>,
    #[arg(long)]
    pub vmware: Option<String>,
}

impl From<ConnectionArgs> for CloudConnections {
    fn from(args: ConnectionArgs) -> Self {
        CloudConnections {
            aws: args.aws,
            ibmcloud: args.ibmcloud,
            vmware: args.vmware,
        }
    }
}

/// Log in and wrap the client for the life-cycle components
pub async fn connect(config: &Config) -> anyhow::Result<Arc<CamClient>> {
    let client = CamClient::connect(config)
        .await
        .with_context(|| format!("Failed to authenticate against {}", config.target))?;
    Ok(Arc::new(client))
}
