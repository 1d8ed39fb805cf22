//! Deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::deploy::fsm::{DeploymentState, Severity};

/// A request to provision a workload, as received from a client
///
/// Numeric fields are kept wide so out-of-range input reaches validation
/// instead of failing at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentRequest {
    pub image_name: String,
    pub service_name: String,
    pub namespace: String,
    pub port: i64,
    pub replicas: i64,
}

/// The accepted request plus values derived while deploying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentDetails {
    #[serde(flatten)]
    pub request: DeploymentRequest,

    /// Local URL once the port has been forwarded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// A deployment record held by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Unique deployment ID
    pub id: String,

    pub details: DeploymentDetails,

    /// Current state
    pub state: DeploymentState,

    /// Failure reason, set together with `Failed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The state the deployment was in when it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DeploymentState>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(id: String, request: DeploymentRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            details: DeploymentDetails {
                request,
                service_url: None,
            },
            state: DeploymentState::Pending,
            error: None,
            failed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn percentage(&self) -> u8 {
        self.state.percentage()
    }
}

/// Status event sent to observers after every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub deployment_id: String,
    pub details: DeploymentDetails,
    pub state: DeploymentState,

    /// Human readable label of `state`
    pub message: String,

    pub percentage: u8,
    pub variant: Severity,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DeploymentState>,

    pub updated_at: DateTime<Utc>,
}

impl From<&Deployment> for StatusEvent {
    fn from(deployment: &Deployment) -> Self {
        Self {
            deployment_id: deployment.id.clone(),
            details: deployment.details.clone(),
            state: deployment.state,
            message: deployment.state.label().to_string(),
            percentage: deployment.state.percentage(),
            variant: deployment.state.severity(),
            error: deployment.error.clone(),
            failed_at: deployment.failed_at,
            updated_at: deployment.updated_at,
        }
    }
}
