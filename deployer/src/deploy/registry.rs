//! In-memory deployment registry

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::warn;

use crate::deploy::fsm::DeploymentState;
use crate::models::deployment::{Deployment, DeploymentRequest};
use crate::utils::deployment_id;

/// Process-lifetime store of deployment records, keyed by deployment ID
pub struct DeploymentRegistry {
    entries: RwLock<HashMap<String, Deployment>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store a new `Pending` deployment and return its ID
    pub fn register(&self, request: DeploymentRequest) -> String {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // IDs are `<service>-<millis>`; bump the timestamp on collision
        let mut millis = Utc::now().timestamp_millis();
        let mut id = deployment_id(&request.service_name, millis);
        while entries.contains_key(&id) {
            millis += 1;
            id = deployment_id(&request.service_name, millis);
        }

        entries.insert(id.clone(), Deployment::new(id.clone(), request));
        id
    }

    pub fn get(&self, id: &str) -> Option<Deployment> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(id).cloned()
    }

    /// Snapshot of every deployment, oldest first
    pub fn list(&self) -> Vec<Deployment> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut deployments: Vec<Deployment> = entries.values().cloned().collect();
        deployments.sort_by_key(|d| d.created_at);
        deployments
    }

    /// Move a deployment to `state`.
    ///
    /// Returns the updated record, or `None` when the ID is unknown or the
    /// transition is not allowed from the current state.
    pub fn set_state(&self, id: &str, state: DeploymentState) -> Option<Deployment> {
        self.update(id, |deployment| {
            if !deployment.state.can_transition_to(state) {
                warn!(
                    "Rejected transition for deployment '{}': {:?} -> {:?}",
                    id, deployment.state, state
                );
                return false;
            }
            deployment.state = state;
            true
        })
    }

    /// Move a deployment to `Failed`, recording the reason and the step it failed in
    pub fn set_failed(&self, id: &str, reason: &str) -> Option<Deployment> {
        self.update(id, |deployment| {
            if !deployment.state.can_transition_to(DeploymentState::Failed) {
                warn!(
                    "Deployment '{}' is already {:?}, not marking it failed",
                    id, deployment.state
                );
                return false;
            }
            deployment.failed_at = Some(deployment.state);
            deployment.error = Some(reason.to_string());
            deployment.state = DeploymentState::Failed;
            true
        })
    }

    pub fn set_service_url(&self, id: &str, url: &str) -> Option<Deployment> {
        self.update(id, |deployment| {
            deployment.details.service_url = Some(url.to_string());
            true
        })
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<F>(&self, id: &str, apply: F) -> Option<Deployment>
    where
        F: FnOnce(&mut Deployment) -> bool,
    {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let Some(deployment) = entries.get_mut(id) else {
            warn!("Deployment ID '{}' not found", id);
            return None;
        };
        if !apply(deployment) {
            return None;
        }
        deployment.updated_at = Utc::now();
        Some(deployment.clone())
    }
}

impl Default for DeploymentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
