//! CAM target environments and the endpoints derived from them

use crate::error::{ConfigError, Result};
use std::fmt;
use std::str::FromStr;

/// Hosted CAM environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostedEnv {
    Dev,
    Qa,
    Pen,
    Prod,
}

impl HostedEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostedEnv::Dev => "dev",
            HostedEnv::Qa => "qa",
            HostedEnv::Pen => "pen",
            HostedEnv::Prod => "prod",
        }
    }
}

impl fmt::Display for HostedEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostedEnv {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(HostedEnv::Dev),
            "qa" => Ok(HostedEnv::Qa),
            "pen" => Ok(HostedEnv::Pen),
            "prod" => Ok(HostedEnv::Prod),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

/// Where the CAM service lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// CAM as a service, fronted by the Bluemix identity service
    Hosted {
        environment: HostedEnv,
        /// Optional staging infix (`STAGE1`), e.g. `stage1`
        stage1: Option<String>,
    },
    /// A CAM installation reachable at `https://host:port`
    OnPrem { host: String, port: u16 },
}

impl Target {
    pub fn hosted(environment: HostedEnv, stage1: Option<String>) -> Self {
        Target::Hosted {
            environment,
            stage1: stage1.filter(|s| !s.is_empty()),
        }
    }

    /// Parse `host` or `host:port` (port defaults to 30000)
    pub fn on_prem(address: &str) -> Result<Self> {
        let address = address
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/');
        if address.is_empty() {
            return Err(ConfigError::InvalidAddress(address.to_string()));
        }

        match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;
                Ok(Target::OnPrem {
                    host: host.to_string(),
                    port,
                })
            }
            None => Ok(Target::OnPrem {
                host: address.to_string(),
                port: 30000,
            }),
        }
    }

    pub fn is_on_prem(&self) -> bool {
        matches!(self, Target::OnPrem { .. })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Hosted {
                environment,
                stage1: Some(stage1),
            } => write!(f, "hosted:{}.{}", environment, stage1),
            Target::Hosted { environment, .. } => write!(f, "hosted:{}", environment),
            Target::OnPrem { host, port } => write!(f, "on-prem:{}:{}", host, port),
        }
    }
}

/// Base URLs of the services a life-cycle run talks to
///
/// None of the URLs carry a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Identity service (hosted: Bluemix API, on-prem: identity token URL)
    pub auth_host: String,
    /// Stack, template and cloud-connection API
    pub iaas_host: String,
    /// Tenant lookup API
    pub tenant_host: String,
    pub catalog_host: String,
    /// Dashboard URL used to find the CAM service instance (hosted only)
    pub dashboard: Option<String>,
}

impl Endpoints {
    pub fn for_target(target: &Target) -> Self {
        match target {
            Target::Hosted {
                environment,
                stage1,
            } => {
                let stage1 = stage1
                    .as_deref()
                    .map(|s| format!(".{}", s))
                    .unwrap_or_default();
                let proxy = match environment {
                    HostedEnv::Prod => "https://cam-proxy-ng.ng.bluemix.net".to_string(),
                    env => format!("https://cam-proxy-{}{}.ng.bluemix.net", env, stage1),
                };
                let tenant_host = match environment {
                    HostedEnv::Prod => {
                        "https://cam-proxy-ng.ng.bluemix.net/cam/tenant/api/v1".to_string()
                    }
                    env => format!(
                        "https://cam-tenant-api-{}{}.ng.bluemix.net/api/v1",
                        env, stage1
                    ),
                };

                Self {
                    auth_host: format!("https://api{}.ng.bluemix.net", stage1),
                    iaas_host: format!("{}/cam/api/v1", proxy),
                    tenant_host,
                    catalog_host: format!("{}/cam/catalog/api/v1", proxy),
                    dashboard: Some(format!("{}/cam/ui/dashboard", proxy)),
                }
            }
            Target::OnPrem { host, port } => {
                let cam_url = format!("https://{}:{}", host, port);
                Self {
                    auth_host: format!("{}/cam/v1/auth/identitytoken", cam_url),
                    iaas_host: format!("{}/cam/api/v1", cam_url),
                    tenant_host: format!("{}/cam/tenant/api/v1", cam_url),
                    catalog_host: format!("{}/cam/catalog/api/v1", cam_url),
                    dashboard: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosted_env_parse() {
        assert_eq!("dev".parse::<HostedEnv>().unwrap(), HostedEnv::Dev);
        assert_eq!("PROD".parse::<HostedEnv>().unwrap(), HostedEnv::Prod);
        assert!(matches!(
            "staging".parse::<HostedEnv>(),
            Err(ConfigError::UnknownEnvironment(_))
        ));
    }

    #[test]
    fn test_prod_endpoints() {
        let endpoints = Endpoints::for_target(&Target::hosted(HostedEnv::Prod, None));
        assert_eq!(endpoints.auth_host, "https://api.ng.bluemix.net");
        assert_eq!(
            endpoints.iaas_host,
            "https://cam-proxy-ng.ng.bluemix.net/cam/api/v1"
        );
        assert_eq!(
            endpoints.dashboard.as_deref(),
            Some("https://cam-proxy-ng.ng.bluemix.net/cam/ui/dashboard")
        );
    }

    #[test]
    fn test_staged_dev_endpoints() {
        let target = Target::hosted(HostedEnv::Dev, Some("stage1".to_string()));
        let endpoints = Endpoints::for_target(&target);
        assert_eq!(endpoints.auth_host, "https://api.stage1.ng.bluemix.net");
        assert_eq!(
            endpoints.iaas_host,
            "https://cam-proxy-dev.stage1.ng.bluemix.net/cam/api/v1"
        );
        assert_eq!(
            endpoints.tenant_host,
            "https://cam-tenant-api-dev.stage1.ng.bluemix.net/api/v1"
        );
    }

    #[test]
    fn test_empty_stage1_is_ignored() {
        let target = Target::hosted(HostedEnv::Qa, Some(String::new()));
        assert_eq!(
            target,
            Target::Hosted {
                environment: HostedEnv::Qa,
                stage1: None
            }
        );
    }

    #[test]
    fn test_on_prem_address() {
        let target = Target::on_prem("10.0.0.5").unwrap();
        assert_eq!(
            target,
            Target::OnPrem {
                host: "10.0.0.5".to_string(),
                port: 30000
            }
        );

        let target = Target::on_prem("https://cam.example.com:8443/").unwrap();
        let endpoints = Endpoints::for_target(&target);
        assert_eq!(
            endpoints.auth_host,
            "https://cam.example.com:8443/cam/v1/auth/identitytoken"
        );
        assert_eq!(endpoints.iaas_host, "https://cam.example.com:8443/cam/api/v1");
        assert!(endpoints.dashboard.is_none());

        assert!(Target::on_prem("cam:notaport").is_err());
        assert!(Target::on_prem("").is_err());
    }
}
