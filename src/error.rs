// ABOUTME: Application-wide error types for pasang.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid destination {dest:?}: {reason}")]
    InvalidDestination { dest: String, reason: String },

    #[error("no SSH credentials configured for {0}: set ssh_private_key or ssh_password")]
    MissingCredentials(String),

    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    Deploy(#[from] crate::deploy::DeployError),
}

impl Error {
    /// Whether the error was found before any deployment step ran.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound(_)
                | Error::InvalidConfig(_)
                | Error::InvalidDestination { .. }
                | Error::MissingCredentials(_)
                | Error::SourceNotFound(_)
                | Error::Json(_)
                | Error::Yaml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
