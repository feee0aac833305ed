//! Credentials and cloud-connection names taken from the environment

use crate::error::{ConfigError, Result};
use crate::target::Target;
use std::fmt;

/// Read an environment variable, treating an empty value as missing
pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Login material for the identity service
///
/// Held in memory only; `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Hosted {
        /// `apikey` when the password is a platform API key
        username: String,
        password: String,
        org_name: String,
        space_name: String,
    },
    OnPrem {
        username: String,
        password: String,
    },
}

impl Credentials {
    /// Load the credentials the given target needs
    ///
    /// Hosted: `BLUEMIX_USERNAME` (default `apikey`), `BLUEMIX_PASSWORD`,
    /// `BLUEMIX_ORG_NAME`, `BLUEMIX_SPACE_NAME`.
    /// On-prem: `CAM_USERNAME`, `CAM_PASSWORD`.
    pub fn from_env(target: &Target) -> Result<Self> {
        match target {
            Target::Hosted { .. } => Ok(Credentials::Hosted {
                username: optional_env("BLUEMIX_USERNAME").unwrap_or_else(|| "apikey".to_string()),
                password: require_env("BLUEMIX_PASSWORD")?,
                org_name: require_env("BLUEMIX_ORG_NAME")?,
                space_name: require_env("BLUEMIX_SPACE_NAME")?,
            }),
            Target::OnPrem { .. } => Ok(Credentials::OnPrem {
                username: require_env("CAM_USERNAME")?,
                password: require_env("CAM_PASSWORD")?,
            }),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Credentials::Hosted { username, .. } | Credentials::OnPrem { username, .. } => {
                username
            }
        }
    }

    pub fn password(&self) -> &str {
        match self {
            Credentials::Hosted { password, .. } | Credentials::OnPrem { password, .. } => {
                password
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Hosted {
                username,
                org_name,
                space_name,
                ..
            } => f
                .debug_struct("Hosted")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("org_name", org_name)
                .field("space_name", space_name)
                .finish(),
            Credentials::OnPrem { username, .. } => f
                .debug_struct("OnPrem")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Infrastructure provider family a cloud connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Aws,
    IbmCloud,
    Vmware,
}

impl ConnectionKind {
    /// Map a template's provider name to a connection kind
    ///
    /// Matching is exact on the lowercased name.
    pub fn from_provider(provider: &str) -> Option<Self> {
        match provider.trim().to_lowercase().as_str() {
            "aws" | "amazon ec2" | "amazonec2" => Some(ConnectionKind::Aws),
            "ibm" | "ibm cloud" | "ibmcloud" => Some(ConnectionKind::IbmCloud),
            "vsphere" | "vmware" | "vmware vsphere" => Some(ConnectionKind::Vmware),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionKind::Aws => write!(f, "aws"),
            ConnectionKind::IbmCloud => write!(f, "ibmcloud"),
            ConnectionKind::Vmware => write!(f, "vmware"),
        }
    }
}

/// Names of the CAM cloud connections to deploy through, per provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudConnections {
    pub aws: Option<String>,
    pub ibmcloud: Option<String>,
    pub vmware: Option<String>,
}

impl CloudConnections {
    /// `AWS_CLOUD_CONNECTION`, `IBMCLOUD_CLOUD_CONNECTION` and
    /// `VMWARE_CLOUD_CONNECTION` (or `VSPHERE_CLOUD_CONNECTION`)
    pub fn from_env() -> Self {
        Self {
            aws: optional_env("AWS_CLOUD_CONNECTION"),
            ibmcloud: optional_env("IBMCLOUD_CLOUD_CONNECTION"),
            vmware: optional_env("VMWARE_CLOUD_CONNECTION")
                .or_else(|| optional_env("VSPHERE_CLOUD_CONNECTION")),
        }
    }

    /// Values set here win over `other`
    pub fn or(self, other: CloudConnections) -> Self {
        Self {
            aws: self.aws.or(other.aws),
            ibmcloud: self.ibmcloud.or(other.ibmcloud),
            vmware: self.vmware.or(other.vmware),
        }
    }

    pub fn name_for(&self, kind: ConnectionKind) -> Result<&str> {
        let name = match kind {
            ConnectionKind::Aws => self.aws.as_deref(),
            ConnectionKind::IbmCloud => self.ibmcloud.as_deref(),
            ConnectionKind::Vmware => self.vmware.as_deref(),
        };
        name.ok_or_else(|| ConfigError::ConnectionNotConfigured(kind.to_string()))
    }
}
