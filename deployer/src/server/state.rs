//! Server state

use std::sync::Arc;

use crate::deploy::Orchestrator;
use crate::notify::NotificationBus;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    pub bus: Arc<NotificationBus>,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let bus = orchestrator.bus().clone();
        Self { orchestrator, bus }
    }
}
