use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' must be set to a non-empty value")]
    MissingEnvVar(String),

    #[error("Unknown CAM environment '{0}' (expected one of: dev, qa, pen, prod)")]
    UnknownEnvironment(String),

    #[error("Invalid on-prem address: {0}")]
    InvalidAddress(String),

    #[error("No cloud connection configured for {0}")]
    ConnectionNotConfigured(String),

    #[error("Settings file error: {path}\nReason: {message}")]
    Settings { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
