//! Finite state machine for a deployment pipeline

use serde::{Deserialize, Serialize};

/// Severity class attached to each state, for UIs and log levels only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Neutral,
    Progressing,
    Warning,
    Success,
    Error,
}

/// Deployment state
///
/// Variants are declared in pipeline order. A deployment only ever moves
/// forward through this list, skipping states where a step does not apply,
/// except for `Failed` which can be entered from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeploymentState {
    Pending,
    Validating,
    NamespaceCheck,
    CreatingNamespace,
    NamespaceCreated,
    CreatingDeployment,
    DeploymentCreated,
    CreatingService,
    ServiceCreated,
    WaitingForPods,
    PodsReady,
    PortForwarding,
    Completed,
    Failed,
}

impl DeploymentState {
    /// Every state, in pipeline order
    pub const ALL: [DeploymentState; 14] = [
        DeploymentState::Pending,
        DeploymentState::Validating,
        DeploymentState::NamespaceCheck,
        DeploymentState::CreatingNamespace,
        DeploymentState::NamespaceCreated,
        DeploymentState::CreatingDeployment,
        DeploymentState::DeploymentCreated,
        DeploymentState::CreatingService,
        DeploymentState::ServiceCreated,
        DeploymentState::WaitingForPods,
        DeploymentState::PodsReady,
        DeploymentState::PortForwarding,
        DeploymentState::Completed,
        DeploymentState::Failed,
    ];

    /// Completion percentage reported to observers
    pub fn percentage(&self) -> u8 {
        match self {
            DeploymentState::Pending => 0,
            DeploymentState::Validating => 10,
            DeploymentState::NamespaceCheck => 20,
            DeploymentState::CreatingNamespace => 30,
            DeploymentState::NamespaceCreated => 30,
            DeploymentState::CreatingDeployment => 40,
            DeploymentState::DeploymentCreated => 50,
            DeploymentState::CreatingService => 60,
            DeploymentState::ServiceCreated => 70,
            DeploymentState::WaitingForPods => 80,
            DeploymentState::PodsReady => 90,
            DeploymentState::PortForwarding => 95,
            DeploymentState::Completed => 100,
            DeploymentState::Failed => 100,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DeploymentState::Pending
            | DeploymentState::Validating
            | DeploymentState::NamespaceCheck => Severity::Neutral,
            DeploymentState::CreatingNamespace
            | DeploymentState::NamespaceCreated
            | DeploymentState::CreatingDeployment
            | DeploymentState::DeploymentCreated
            | DeploymentState::CreatingService
            | DeploymentState::ServiceCreated => Severity::Progressing,
            DeploymentState::WaitingForPods => Severity::Warning,
            DeploymentState::PodsReady
            | DeploymentState::PortForwarding
            | DeploymentState::Completed => Severity::Success,
            DeploymentState::Failed => Severity::Error,
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentState::Pending => "Deployment pending",
            DeploymentState::Validating => "Validating deployment details",
            DeploymentState::NamespaceCheck => "Checking namespace availability",
            DeploymentState::CreatingNamespace => "Creating namespace",
            DeploymentState::NamespaceCreated => "Namespace created",
            DeploymentState::CreatingDeployment => "Creating deployment",
            DeploymentState::DeploymentCreated => "Deployment created",
            DeploymentState::CreatingService => "Creating service",
            DeploymentState::ServiceCreated => "Service created",
            DeploymentState::WaitingForPods => "Waiting for pods to be ready",
            DeploymentState::PodsReady => "Pods are ready",
            DeploymentState::PortForwarding => "Forwarding port to host machine",
            DeploymentState::Completed => "Deployment completed",
            DeploymentState::Failed => "Deployment failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentState::Completed | DeploymentState::Failed)
    }

    fn ordinal(&self) -> usize {
        Self::ALL
            .iter()
            .position(|state| state == self)
            .unwrap_or(Self::ALL.len())
    }

    /// Check whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: DeploymentState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            DeploymentState::Failed => true,
            next => next.ordinal() > self.ordinal(),
        }
    }
}

impl std::fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
