//! HTTP API tests

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use kubedeploy::deploy::fsm::DeploymentState;
use kubedeploy::server::serve::router;
use kubedeploy::server::state::ServerState;

use common::{nginx_request, FakeGateway, FakeRunner, Harness};

fn app(harness: &Harness) -> Router {
    router(Arc::new(ServerState::new(harness.orchestrator.clone())))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_deploy(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/deploy")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "kubedeploy");
}

#[tokio::test]
async fn test_version() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness).oneshot(get("/version")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_deploy_returns_identifier_and_runs() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness)
        .oneshot(post_deploy(json!({
            "imageName": "nginx:latest",
            "serviceName": "nginx",
            "namespace": "default",
            "port": 80,
            "replicas": 1,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let id = body["deploymentId"].as_str().unwrap().to_string();
    assert!(id.starts_with("nginx-"));
    assert!(harness.registry.get(&id).is_some());

    // The pipeline runs in the background
    for _ in 0..100 {
        if harness.registry.get(&id).map(|d| d.state) == Some(DeploymentState::Completed) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("deployment did not complete");
}

#[tokio::test]
async fn test_deploy_rejects_invalid_request() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness)
        .oneshot(post_deploy(json!({
            "imageName": "nginx:latest",
            "serviceName": "nginx",
            "namespace": "default",
            "port": 0,
            "replicas": 1,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "port out of range");
    assert!(harness.registry.is_empty());
    assert!(harness.gateway.calls().is_empty());
}

#[tokio::test]
async fn test_deploy_rejects_missing_image() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness)
        .oneshot(post_deploy(json!({
            "serviceName": "nginx",
            "namespace": "default",
            "port": 80,
            "replicas": 1,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "image name required");
}

#[tokio::test]
async fn test_list_and_get_deployments() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let request = nginx_request();
    let id = harness.orchestrator.submit(request.clone()).unwrap();
    harness.orchestrator.run(&id, &request).await.unwrap();

    let response = app(&harness).oneshot(get("/deployments")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["deployments"][0]["deploymentId"], id.as_str());

    let response = app(&harness)
        .oneshot(get(&format!("/deployments/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["state"], "Completed");
    assert_eq!(body["percentage"], 100);
    assert_eq!(body["variant"], "success");
    assert_eq!(body["details"]["imageName"], "nginx:latest");
    assert!(body["details"]["serviceUrl"]
        .as_str()
        .unwrap()
        .starts_with("http://127.0.0.1:"));
}

#[tokio::test]
async fn test_get_unknown_deployment() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness)
        .oneshot(get("/deployments/ghost-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unknown deployment: ghost-1");
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_delete_releases_port_forward() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let request = nginx_request();
    let id = harness.orchestrator.submit(request.clone()).unwrap();
    harness.orchestrator.run(&id, &request).await.unwrap();
    assert_eq!(harness.orchestrator.active_port_forwards(), 1);

    let response = app(&harness)
        .oneshot(delete(&format!("/deployments/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["deploymentId"], id.as_str());
    assert_eq!(body["released"], true);
    assert_eq!(harness.orchestrator.active_port_forwards(), 0);
    assert_eq!(harness.runner.killed(), 1);

    // Already released
    let response = app(&harness)
        .oneshot(delete(&format!("/deployments/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["released"], false);
}

#[tokio::test]
async fn test_delete_unknown_deployment() {
    let harness = Harness::new(FakeGateway::new(), FakeRunner::new());
    let response = app(&harness)
        .oneshot(delete("/deployments/ghost-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
