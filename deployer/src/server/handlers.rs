//! HTTP request handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::deployment::{DeploymentRequest, StatusEvent};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "kubedeploy".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Deploy response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponse {
    pub deployment_id: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Accept a deployment and start it in the background
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeploymentRequest>,
) -> Response {
    match state.orchestrator.submit(request.clone()) {
        Ok(deployment_id) => {
            state.orchestrator.launch(deployment_id.clone(), request);
            Json(DeployResponse { deployment_id }).into_response()
        }
        Err(e) if e.is_validation() => {
            warn!("Rejected deployment request: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Deployments response
#[derive(Debug, Serialize)]
pub struct DeploymentsResponse {
    pub deployments: Vec<StatusEvent>,
    pub total: usize,
}

/// List every known deployment
pub async fn deployments_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let deployments: Vec<StatusEvent> = state
        .orchestrator
        .registry()
        .list()
        .iter()
        .map(StatusEvent::from)
        .collect();
    let total = deployments.len();
    Json(DeploymentsResponse { deployments, total })
}

/// Current status of one deployment
pub async fn deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    match state.orchestrator.get_deployment(&id) {
        Some(deployment) => Json(StatusEvent::from(&deployment)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("Unknown deployment: {}", id)),
    }
}

/// Release response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    pub deployment_id: String,

    /// Whether a running port-forward was stopped
    pub released: bool,
}

/// Stop the port-forward of a deployment. Cluster objects are left in place.
pub async fn release_handler(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    if state.orchestrator.get_deployment(&id).is_none() {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown deployment: {}", id));
    }
    let released = state.orchestrator.release(&id);
    Json(ReleaseResponse {
        deployment_id: id,
        released,
    })
    .into_response()
}
