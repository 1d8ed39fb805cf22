//! Deployment orchestrator
//!
//! Drives one deployment through the provisioning pipeline:
//!
//! ```text
//! Validating -> NamespaceCheck -> [CreatingNamespace -> NamespaceCreated]
//!   -> CreatingDeployment -> DeploymentCreated -> CreatingService -> ServiceCreated
//!   -> WaitingForPods -> PodsReady -> PortForwarding -> Completed
//! ```
//!
//! Every transition is written to the registry first and the updated record
//! is then published on the notification bus. A failing step moves the
//! deployment to `Failed` and the error is returned to the caller. Cluster
//! objects created before the failure are left in place.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cluster::{
    endpoint_name, workload_labels, ClusterGateway, EndpointSpec, ServiceType, WorkloadSpec,
};
use crate::deploy::fsm::DeploymentState;
use crate::deploy::readiness::{wait_for_ready, ReadinessOptions};
use crate::deploy::registry::DeploymentRegistry;
use crate::deploy::validation::{validate, ValidationError};
use crate::errors::DeployError;
use crate::models::deployment::{Deployment, DeploymentRequest};
use crate::notify::NotificationBus;
use crate::process::{CommandRunner, CommandSpec, KillSwitch, OutputLine, ProcessHandle};
use crate::utils::pick_local_port;

/// Port forwarding options
#[derive(Debug, Clone)]
pub struct PortForwardOptions {
    /// kubectl binary used for `port-forward`
    pub kubectl_path: String,

    /// Local ports are picked from this range
    pub port_range: Range<u16>,

    /// Host used in the service URL
    pub local_host: String,
}

impl Default for PortForwardOptions {
    fn default() -> Self {
        Self {
            kubectl_path: "kubectl".to_string(),
            port_range: 30000..40000,
            local_host: "127.0.0.1".to_string(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub readiness: ReadinessOptions,
    pub port_forward: PortForwardOptions,

    /// Type of the service created in front of the workload
    pub service_type: ServiceType,

    /// Pause before validation, simulating a slow validation step
    pub validation_delay: Duration,

    /// Close all observers once a launched deployment is terminal
    pub close_observers_on_terminal: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            readiness: ReadinessOptions::default(),
            port_forward: PortForwardOptions::default(),
            service_type: ServiceType::default(),
            validation_delay: Duration::ZERO,
            close_observers_on_terminal: true,
        }
    }
}

/// Deployment orchestrator
pub struct Orchestrator {
    settings: EngineSettings,
    gateway: Arc<dyn ClusterGateway>,
    runner: Arc<dyn CommandRunner>,
    registry: Arc<DeploymentRegistry>,
    bus: Arc<NotificationBus>,
    forwards: Mutex<HashMap<String, KillSwitch>>,
}

impl Orchestrator {
    pub fn new(
        settings: EngineSettings,
        gateway: Arc<dyn ClusterGateway>,
        runner: Arc<dyn CommandRunner>,
        registry: Arc<DeploymentRegistry>,
        bus: Arc<NotificationBus>,
    ) -> Self {
        Self {
            settings,
            gateway,
            runner,
            registry,
            bus,
            forwards: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<DeploymentRegistry> {
        &self.registry
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Validate and register a request. The deployment starts `Pending`.
    pub fn submit(&self, request: DeploymentRequest) -> Result<String, DeployError> {
        validate(&request)?;
        let id = self.registry.register(request);
        info!("Deployment '{}' registered", id);
        Ok(id)
    }

    pub fn get_deployment(&self, id: &str) -> Option<Deployment> {
        self.registry.get(id)
    }

    /// Run the pipeline for a registered deployment.
    ///
    /// A deployment can only be run once: the run claims it by moving it out
    /// of `Pending`. Errors raised by a step leave the deployment `Failed`,
    /// and so does a panic inside a step.
    pub async fn run(&self, id: &str, request: &DeploymentRequest) -> Result<(), DeployError> {
        let Some(claimed) = self.registry.set_state(id, DeploymentState::Validating) else {
            return Err(match self.registry.get(id) {
                None => DeployError::UnknownDeployment(id.to_string()),
                Some(deployment) => DeployError::AlreadyStarted {
                    id: id.to_string(),
                    state: deployment.state,
                },
            });
        };
        self.publish(id, &claimed);

        let outcome = AssertUnwindSafe(self.run_steps(id, request))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(DeployError::StepPanicked(panic_message(payload.as_ref())))
            });

        match outcome {
            Ok(()) => {
                info!("Deployment '{}' completed", id);
                Ok(())
            }
            Err(e) => {
                self.fail(id, &e);
                Err(e)
            }
        }
    }

    /// Spawn `run` as a background task and log its outcome
    pub fn launch(self: &Arc<Self>, id: String, request: DeploymentRequest) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(&id, &request).await {
                error!("Error during deployment process for '{}': {}", id, e);
            }
            if orchestrator.settings.close_observers_on_terminal {
                orchestrator.bus.close_all(&id);
            }
        })
    }

    /// Terminate the port-forward process owned for a deployment
    pub fn release(&self, id: &str) -> bool {
        let kill = {
            let mut forwards = self.forwards.lock().unwrap_or_else(|e| e.into_inner());
            forwards.remove(id)
        };
        match kill {
            Some(kill) => {
                info!("Stopping port-forward for deployment '{}'", id);
                kill.kill();
                true
            }
            None => false,
        }
    }

    /// Terminate every owned port-forward process
    pub fn shutdown(&self) {
        let forwards: Vec<(String, KillSwitch)> = {
            let mut forwards = self.forwards.lock().unwrap_or_else(|e| e.into_inner());
            forwards.drain().collect()
        };
        info!("Stopping {} port-forward processes", forwards.len());
        for (_, kill) in forwards {
            kill.kill();
        }
    }

    pub fn active_port_forwards(&self) -> usize {
        let forwards = self.forwards.lock().unwrap_or_else(|e| e.into_inner());
        forwards.len()
    }

    async fn run_steps(&self, id: &str, request: &DeploymentRequest) -> Result<(), DeployError> {
        // Validation
        if !self.settings.validation_delay.is_zero() {
            tokio::time::sleep(self.settings.validation_delay).await;
        }
        validate(request)?;
        let workload = workload_spec(request)?;
        let endpoint = endpoint_spec(request, self.settings.service_type)?;
        let service_port =
            u16::try_from(request.port).map_err(|_| ValidationError::PortOutOfRange)?;

        // Namespace
        self.ensure_namespace(id, &workload.namespace).await?;

        // Workload
        self.transition(id, DeploymentState::CreatingDeployment);
        self.gateway.create_workload(&workload).await?;
        info!(
            "Deployment '{}' created in namespace '{}'",
            workload.name, workload.namespace
        );
        self.transition(id, DeploymentState::DeploymentCreated);

        // Network endpoint
        self.transition(id, DeploymentState::CreatingService);
        self.gateway.create_service_endpoint(&endpoint).await?;
        info!(
            "Service '{}' of type '{}' created",
            endpoint.name,
            endpoint.service_type.as_str()
        );
        self.transition(id, DeploymentState::ServiceCreated);

        // Readiness
        self.transition(id, DeploymentState::WaitingForPods);
        wait_for_ready(
            self.gateway.as_ref(),
            &workload.namespace,
            &workload.name,
            &self.settings.readiness,
            tokio::time::sleep,
        )
        .await?;
        self.transition(id, DeploymentState::PodsReady);

        // Port exposure
        self.transition(id, DeploymentState::PortForwarding);
        let url = self.expose_port(id, &endpoint, service_port)?;
        if let Some(updated) = self.registry.set_service_url(id, &url) {
            debug!("Deployment '{}' service URL: {:?}", id, updated.details.service_url);
        }
        info!("Service available at {}", url);
        self.transition(id, DeploymentState::Completed);

        Ok(())
    }

    async fn ensure_namespace(&self, id: &str, namespace: &str) -> Result<(), DeployError> {
        self.transition(id, DeploymentState::NamespaceCheck);
        info!("Checking namespace: {}", namespace);

        match self.gateway.read_namespace(namespace).await {
            Ok(()) => {
                debug!("Namespace '{}' exists", namespace);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!("Namespace '{}' not found. Creating it...", namespace);
                self.transition(id, DeploymentState::CreatingNamespace);
                self.gateway.create_namespace(namespace).await?;
                info!("Namespace '{}' created", namespace);
                self.transition(id, DeploymentState::NamespaceCreated);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn expose_port(
        &self,
        id: &str,
        endpoint: &EndpointSpec,
        service_port: u16,
    ) -> Result<String, DeployError> {
        let options = &self.settings.port_forward;
        let local_port = pick_local_port(&options.port_range);
        let command = CommandSpec::port_forward(
            &options.kubectl_path,
            &endpoint.namespace,
            &endpoint.name,
            local_port,
            service_port,
        );
        info!("Executing: {}", command);

        let mut handle = self.runner.run(&command)?;
        if let Some(kill) = handle.kill_switch() {
            let mut forwards = self.forwards.lock().unwrap_or_else(|e| e.into_inner());
            forwards.insert(id.to_string(), kill);
        }
        tokio::spawn(watch_port_forward(id.to_string(), handle));

        Ok(format!("http://{}:{}", options.local_host, local_port))
    }

    /// Record a transition and forward the updated record to observers
    fn transition(&self, id: &str, state: DeploymentState) {
        if let Some(updated) = self.registry.set_state(id, state) {
            info!("Deployment '{}': {}", id, state);
            self.publish(id, &updated);
        }
    }

    fn fail(&self, id: &str, err: &DeployError) {
        if let Some(updated) = self.registry.set_failed(id, &err.to_string()) {
            warn!(
                "Deployment '{}' failed while {:?}: {}",
                id, updated.failed_at, err
            );
            self.publish(id, &updated);
        }
    }

    fn publish(&self, id: &str, deployment: &Deployment) {
        self.bus.publish(id, deployment);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn workload_spec(request: &DeploymentRequest) -> Result<WorkloadSpec, DeployError> {
    let service_name = request.service_name.trim();
    Ok(WorkloadSpec {
        name: service_name.to_string(),
        namespace: request.namespace.trim().to_string(),
        image: request.image_name.trim().to_string(),
        container_port: i32::try_from(request.port).map_err(|_| ValidationError::PortOutOfRange)?,
        replicas: i32::try_from(request.replicas).map_err(|_| ValidationError::InvalidReplicas)?,
        labels: workload_labels(service_name),
    })
}

fn endpoint_spec(
    request: &DeploymentRequest,
    service_type: ServiceType,
) -> Result<EndpointSpec, DeployError> {
    let service_name = request.service_name.trim();
    let port = i32::try_from(request.port).map_err(|_| ValidationError::PortOutOfRange)?;
    Ok(EndpointSpec {
        name: endpoint_name(service_name),
        namespace: request.namespace.trim().to_string(),
        selector: workload_labels(service_name),
        port,
        target_port: port,
        service_type,
    })
}

async fn watch_port_forward(id: String, mut handle: ProcessHandle) {
    while let Some(line) = handle.next_line().await {
        match line {
            OutputLine::Stdout(line) => info!("Port-forward output [{}]: {}", id, line),
            OutputLine::Stderr(line) => warn!("Port-forward error [{}]: {}", id, line),
        }
    }
    let code = handle.wait().await;
    info!("Port-forward process for '{}' exited with code {:?}", id, code);
}
