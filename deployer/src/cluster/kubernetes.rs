//! Kubernetes implementation of the cluster gateway

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::debug;

use crate::cluster::{
    manifests, ClusterError, ClusterGateway, EndpointSpec, WorkloadSpec, WorkloadStatus,
};
use crate::errors::DeployError;

/// Cluster gateway backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the default kubeconfig or in-cluster service account
    pub async fn try_default() -> Result<Self, DeployError> {
        let client = Client::try_default()
            .await
            .map_err(|e| DeployError::ConfigError(format!("Failed to create Kubernetes client: {}", e)))?;
        Ok(Self::new(client))
    }
}

fn map_kube_error(err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => {
            ClusterError::NotFound(response.message)
        }
        other => ClusterError::Api(other.to_string()),
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn read_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.get(name).await.map_err(map_kube_error)?;
        Ok(())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.create(&PostParams::default(), &manifests::namespace(name))
            .await
            .map_err(map_kube_error)?;
        debug!("Namespace '{}' created", name);
        Ok(())
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<(), ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &spec.namespace);
        api.create(&PostParams::default(), &manifests::deployment(spec))
            .await
            .map_err(map_kube_error)?;
        debug!("Deployment '{}' created in '{}'", spec.name, spec.namespace);
        Ok(())
    }

    async fn create_service_endpoint(&self, spec: &EndpointSpec) -> Result<(), ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), &spec.namespace);
        api.create(&PostParams::default(), &manifests::service(spec))
            .await
            .map_err(map_kube_error)?;
        debug!(
            "Service '{}' of type '{}' created in '{}'",
            spec.name,
            spec.service_type.as_str(),
            spec.namespace
        );
        Ok(())
    }

    async fn read_workload_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployment = api.get_status(name).await.map_err(map_kube_error)?;

        let desired_replicas = deployment
            .spec
            .as_ref()
            .and_then(|spec| spec.replicas)
            .unwrap_or(0);
        let available_replicas = deployment
            .status
            .as_ref()
            .and_then(|status| status.available_replicas)
            .unwrap_or(0);

        Ok(WorkloadStatus {
            desired_replicas,
            available_replicas,
        })
    }
}
