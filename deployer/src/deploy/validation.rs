//! Structural validation of deployment requests

use thiserror::Error;

use crate::models::deployment::DeploymentRequest;

/// Reason a deployment request was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("image name required")]
    MissingImageName,

    #[error("service name required")]
    MissingServiceName,

    #[error("namespace required")]
    MissingNamespace,

    #[error("port out of range")]
    PortOutOfRange,

    #[error("replicas must be a positive integer")]
    InvalidReplicas,
}

/// Validate a request. Rules are checked in order and the first failure wins.
pub fn validate(request: &DeploymentRequest) -> Result<(), ValidationError> {
    if request.image_name.trim().is_empty() {
        return Err(ValidationError::MissingImageName);
    }
    if request.service_name.trim().is_empty() {
        return Err(ValidationError::MissingServiceName);
    }
    if request.namespace.trim().is_empty() {
        return Err(ValidationError::MissingNamespace);
    }
    if !(1..=65535).contains(&request.port) {
        return Err(ValidationError::PortOutOfRange);
    }
    if request.replicas < 1 {
        return Err(ValidationError::InvalidReplicas);
    }
    Ok(())
}
