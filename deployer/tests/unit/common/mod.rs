//! Test doubles for the cluster and the process runner

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use kubedeploy::cluster::{ClusterError, ClusterGateway, EndpointSpec, WorkloadSpec, WorkloadStatus};
use kubedeploy::deploy::readiness::ReadinessOptions;
use kubedeploy::deploy::registry::DeploymentRegistry;
use kubedeploy::deploy::{EngineSettings, Orchestrator};
use kubedeploy::errors::DeployError;
use kubedeploy::models::deployment::DeploymentRequest;
use kubedeploy::notify::NotificationBus;
use kubedeploy::process::{CommandRunner, CommandSpec, ProcessHandle};

/// Cluster call recorded by [`FakeGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ReadNamespace(String),
    CreateNamespace(String),
    CreateWorkload(WorkloadSpec),
    CreateServiceEndpoint(EndpointSpec),
    ReadWorkloadStatus(String, String),
}

/// In-memory cluster with scripted failures
#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<Call>>,
    pub namespace_error: Mutex<Option<ClusterError>>,
    pub workload_error: Mutex<Option<ClusterError>>,
    pub workload_panics: AtomicBool,
    pub service_error: Mutex<Option<ClusterError>>,
    pub statuses: Mutex<VecDeque<WorkloadStatus>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing_namespace(self) -> Self {
        *self.namespace_error.lock().unwrap() =
            Some(ClusterError::NotFound("namespaces \"dev\" not found".to_string()));
        self
    }

    pub fn with_namespace_error(self, message: &str) -> Self {
        *self.namespace_error.lock().unwrap() = Some(ClusterError::Api(message.to_string()));
        self
    }

    pub fn with_workload_error(self, message: &str) -> Self {
        *self.workload_error.lock().unwrap() = Some(ClusterError::Api(message.to_string()));
        self
    }

    pub fn with_workload_panic(self) -> Self {
        self.workload_panics.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_service_error(self, message: &str) -> Self {
        *self.service_error.lock().unwrap() = Some(ClusterError::Api(message.to_string()));
        self
    }

    /// Statuses returned by successive readiness polls. Once exhausted the
    /// last one repeats; with none scripted every poll is ready.
    pub fn with_statuses(self, statuses: Vec<WorkloadStatus>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ClusterGateway for FakeGateway {
    async fn read_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.record(Call::ReadNamespace(name.to_string()));
        match self.namespace_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.record(Call::CreateNamespace(name.to_string()));
        Ok(())
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<(), ClusterError> {
        self.record(Call::CreateWorkload(spec.clone()));
        if self.workload_panics.load(Ordering::SeqCst) {
            panic!("workload backend crashed");
        }
        match self.workload_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn create_service_endpoint(&self, spec: &EndpointSpec) -> Result<(), ClusterError> {
        self.record(Call::CreateServiceEndpoint(spec.clone()));
        match self.service_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn read_workload_status(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<WorkloadStatus, ClusterError> {
        self.record(Call::ReadWorkloadStatus(namespace.to_string(), name.to_string()));
        let mut statuses = self.statuses.lock().unwrap();
        let status = match statuses.len() {
            0 => WorkloadStatus {
                desired_replicas: 1,
                available_replicas: 1,
            },
            1 => statuses[0],
            _ => statuses.pop_front().unwrap_or_default(),
        };
        Ok(status)
    }
}

/// Runner that records commands and hands out silent process handles
#[derive(Default)]
pub struct FakeRunner {
    pub commands: Mutex<Vec<CommandSpec>>,
    pub kill_signals: Mutex<Vec<oneshot::Receiver<()>>>,
    pub fail_with: Mutex<Option<String>>,
    // Kept alive so the fake processes never report an exit on their own
    senders: Mutex<Vec<oneshot::Sender<Option<i32>>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        let runner = Self::default();
        *runner.fail_with.lock().unwrap() = Some(message.to_string());
        runner
    }

    pub fn commands(&self) -> Vec<CommandSpec> {
        self.commands.lock().unwrap().clone()
    }

    /// Number of spawned processes whose kill switch was used or dropped
    pub fn killed(&self) -> usize {
        let mut signals = self.kill_signals.lock().unwrap();
        let mut killed = 0;
        for rx in signals.iter_mut() {
            if !matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
                killed += 1;
            }
        }
        killed
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &CommandSpec) -> Result<ProcessHandle, DeployError> {
        self.commands.lock().unwrap().push(command.clone());
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(DeployError::ProcessError(message));
        }

        let (_line_tx, line_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.senders.lock().unwrap().push(exit_tx);
        self.kill_signals.lock().unwrap().push(kill_rx);
        Ok(ProcessHandle::new(command.to_string(), line_rx, exit_rx, kill_tx))
    }
}

/// Orchestrator wired to fresh fakes
pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub runner: Arc<FakeRunner>,
    pub registry: Arc<DeploymentRegistry>,
    pub bus: Arc<NotificationBus>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(gateway: FakeGateway, runner: FakeRunner) -> Self {
        Self::with_settings(gateway, runner, test_settings())
    }

    pub fn with_settings(gateway: FakeGateway, runner: FakeRunner, settings: EngineSettings) -> Self {
        let gateway = Arc::new(gateway);
        let runner = Arc::new(runner);
        let registry = Arc::new(DeploymentRegistry::new());
        let bus = Arc::new(NotificationBus::new());
        let orchestrator = Arc::new(Orchestrator::new(
            settings,
            gateway.clone(),
            runner.clone(),
            registry.clone(),
            bus.clone(),
        ));
        Self {
            gateway,
            runner,
            registry,
            bus,
            orchestrator,
        }
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        readiness: ReadinessOptions {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(3),
        },
        ..Default::default()
    }
}

pub fn nginx_request() -> DeploymentRequest {
    DeploymentRequest {
        image_name: "nginx:latest".to_string(),
        service_name: "nginx".to_string(),
        namespace: "default".to_string(),
        port: 80,
        replicas: 1,
    }
}
