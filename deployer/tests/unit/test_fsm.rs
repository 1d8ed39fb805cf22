//! State machine and registry tests

use kubedeploy::deploy::fsm::{DeploymentState, Severity};
use kubedeploy::deploy::registry::DeploymentRegistry;
use kubedeploy::models::deployment::DeploymentRequest;

fn request(service: &str) -> DeploymentRequest {
    DeploymentRequest {
        image_name: "nginx:latest".to_string(),
        service_name: service.to_string(),
        namespace: "default".to_string(),
        port: 80,
        replicas: 1,
    }
}

#[test]
fn test_percentages_never_decrease_along_pipeline() {
    let percentages: Vec<u8> = DeploymentState::ALL[..13]
        .iter()
        .map(DeploymentState::percentage)
        .collect();
    assert!(percentages.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(percentages.first(), Some(&0));
    assert_eq!(percentages.last(), Some(&100));
}

#[test]
fn test_every_non_terminal_state_can_fail() {
    for state in DeploymentState::ALL {
        assert_eq!(
            state.can_transition_to(DeploymentState::Failed),
            !state.is_terminal(),
            "{:?}",
            state
        );
    }
}

#[test]
fn test_terminal_states_accept_nothing() {
    for terminal in [DeploymentState::Completed, DeploymentState::Failed] {
        for next in DeploymentState::ALL {
            assert!(!terminal.can_transition_to(next));
        }
    }
}

#[test]
fn test_namespace_branch_is_optional() {
    assert!(DeploymentState::NamespaceCheck.can_transition_to(DeploymentState::CreatingDeployment));
    assert!(DeploymentState::NamespaceCheck.can_transition_to(DeploymentState::CreatingNamespace));
    assert!(!DeploymentState::CreatingDeployment.can_transition_to(DeploymentState::CreatingNamespace));
}

#[test]
fn test_failed_severity() {
    assert_eq!(DeploymentState::Failed.severity(), Severity::Error);
    assert_eq!(DeploymentState::Failed.percentage(), 100);
    assert_eq!(DeploymentState::WaitingForPods.severity(), Severity::Warning);
}

#[test]
fn test_registry_flow() {
    let registry = DeploymentRegistry::new();
    let id = registry.register(request("svc"));
    assert_eq!(registry.get(&id).unwrap().state, DeploymentState::Pending);

    assert!(registry.set_state(&id, DeploymentState::Validating).is_some());
    assert!(registry.set_state(&id, DeploymentState::NamespaceCheck).is_some());

    // No regression
    assert!(registry.set_state(&id, DeploymentState::Validating).is_none());
    assert_eq!(registry.get(&id).unwrap().state, DeploymentState::NamespaceCheck);

    let failed = registry.set_failed(&id, "boom").unwrap();
    assert_eq!(failed.state, DeploymentState::Failed);
    assert_eq!(failed.failed_at, Some(DeploymentState::NamespaceCheck));
    assert_eq!(failed.error.as_deref(), Some("boom"));

    // Terminal
    assert!(registry.set_state(&id, DeploymentState::Completed).is_none());
    assert!(registry.set_failed(&id, "again").is_none());
    assert_eq!(registry.get(&id).unwrap().error.as_deref(), Some("boom"));
}

#[test]
fn test_registry_ids_are_unique() {
    let registry = DeploymentRegistry::new();
    let ids: Vec<String> = (0..50).map(|_| registry.register(request("svc"))).collect();
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 50);
    assert_eq!(registry.len(), 50);
}

#[test]
fn test_registry_unknown_id() {
    let registry = DeploymentRegistry::new();
    assert!(registry.get("missing-1").is_none());
    assert!(registry.set_state("missing-1", DeploymentState::Validating).is_none());
    assert!(registry.set_failed("missing-1", "boom").is_none());
    assert!(registry.is_empty());
}
