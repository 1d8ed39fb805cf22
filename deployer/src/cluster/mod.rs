//! Cluster gateway
//!
//! The orchestrator talks to the cluster only through [`ClusterGateway`].
//! Implementations are plain pass-throughs to a cluster API.

pub mod kubernetes;
pub mod manifests;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use kubernetes::KubeGateway;

/// Error returned by a cluster operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// The requested object does not exist
    #[error("{0}")]
    NotFound(String),

    /// Any other API or transport failure
    #[error("{0}")]
    Api(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound(_))
    }
}

/// Exposure type of the network endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "ClusterIP")]
    ClusterIp,
    #[default]
    NodePort,
    LoadBalancer,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::ClusterIp => "ClusterIP",
            ServiceType::NodePort => "NodePort",
            ServiceType::LoadBalancer => "LoadBalancer",
        }
    }
}

/// Workload to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub container_port: i32,
    pub replicas: i32,
    pub labels: BTreeMap<String, String>,
}

/// Network endpoint to create in front of a workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub port: i32,
    pub target_port: i32,
    pub service_type: ServiceType,
}

/// Replica counts of a workload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub desired_replicas: i32,
    pub available_replicas: i32,
}

impl WorkloadStatus {
    pub fn is_ready(&self) -> bool {
        self.available_replicas == self.desired_replicas
    }
}

/// Cluster operations used by the orchestrator
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Read a namespace; `ClusterError::NotFound` when it does not exist
    async fn read_namespace(&self, name: &str) -> Result<(), ClusterError>;

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError>;

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<(), ClusterError>;

    async fn create_service_endpoint(&self, spec: &EndpointSpec) -> Result<(), ClusterError>;

    async fn read_workload_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WorkloadStatus, ClusterError>;
}

/// Labels shared by a workload and the selector of its endpoint
pub fn workload_labels(service_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), service_name.to_string())])
}

/// Name of the endpoint created for a service
pub fn endpoint_name(service_name: &str) -> String {
    format!("{}-service", service_name)
}
