//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::cluster::ClusterGateway;
use crate::deploy::registry::DeploymentRegistry;
use crate::deploy::{EngineSettings, Orchestrator};
use crate::notify::NotificationBus;
use crate::process::CommandRunner;

/// Main application state
pub struct AppState {
    /// Deployment records
    pub registry: Arc<DeploymentRegistry>,

    /// Observer fan-out
    pub bus: Arc<NotificationBus>,

    /// Pipeline driver
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initialize application state
    pub fn init(
        engine: EngineSettings,
        gateway: Arc<dyn ClusterGateway>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        info!("Initializing application state...");

        let registry = Arc::new(DeploymentRegistry::new());
        let bus = Arc::new(NotificationBus::new());
        let orchestrator = Arc::new(Orchestrator::new(
            engine,
            gateway,
            runner,
            registry.clone(),
            bus.clone(),
        ));

        Self {
            registry,
            bus,
            orchestrator,
        }
    }

    /// Shutdown application state
    pub fn shutdown(&self) {
        info!("Shutting down application state...");
        self.orchestrator.shutdown();
    }
}
