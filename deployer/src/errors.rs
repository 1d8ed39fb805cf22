//! Error types for the deployment engine

use std::time::Duration;

use thiserror::Error;

use crate::cluster::ClusterError;
use crate::deploy::fsm::DeploymentState;
use crate::deploy::validation::ValidationError;

/// Main error type for the deployment engine
#[derive(Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error(transparent)]
    ClusterError(#[from] ClusterError),

    #[error("Deployment '{workload}' did not become ready within {timeout:?}")]
    ReadinessTimeout { workload: String, timeout: Duration },

    #[error("Unknown deployment: {0}")]
    UnknownDeployment(String),

    #[error("Deployment '{id}' was already started (currently {state:?})")]
    AlreadyStarted { id: String, state: DeploymentState },

    #[error("Deployment step panicked: {0}")]
    StepPanicked(String),

    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl DeployError {
    /// Whether the error was raised before any cluster work happened
    pub fn is_validation(&self) -> bool {
        matches!(self, DeployError::ValidationError(_))
    }
}
