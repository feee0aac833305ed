//! Configuration for stackrun
//!
//! Everything a life-cycle run needs to know about its surroundings is
//! resolved once into an immutable [`Config`] and handed to each component
//! at construction time.

pub mod credentials;
pub mod error;
pub mod settings;
pub mod target;

pub use credentials::{CloudConnections, ConnectionKind, Credentials, require_env};
pub use error::*;
pub use settings::{Settings, find_settings_file};
pub use target::{Endpoints, HostedEnv, Target};

/// Resolved configuration for one process
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub endpoints: Endpoints,
    pub credentials: Credentials,
    pub connections: CloudConnections,
    pub settings: Settings,
    /// On-prem installations usually serve self-signed certificates
    pub accept_invalid_certs: bool,
}

impl Config {
    pub fn new(
        target: Target,
        credentials: Credentials,
        connections: CloudConnections,
        settings: Settings,
    ) -> Self {
        Self {
            endpoints: Endpoints::for_target(&target),
            accept_invalid_certs: target.is_on_prem(),
            target,
            credentials,
            connections,
            settings,
        }
    }

    /// Build the configuration from the environment and the settings file
    pub fn from_env(target: Target, connections: CloudConnections) -> Result<Self> {
        let credentials = Credentials::from_env(&target)?;
        let settings = Settings::load()?;
        Ok(Self::new(
            target,
            credentials,
            connections.or(CloudConnections::from_env()),
            settings,
        ))
    }

    /// Replace the derived endpoints, e.g. to point at a local stub
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}
