//! HTTP surface tests

mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use common::{Harness, deploy_request};
use rollstack_orchestrator::api::{STACKS_PREFIX, create_router};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(harness: &Harness, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let app = create_router(harness.ctx.clone());
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let harness = &Harness::idle();
    let app = create_router(harness.ctx.clone());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_and_read_stack() {
    let harness = &Harness::idle();
    let body = serde_json::to_value(deploy_request()).unwrap();

    let (status, created) = send(&harness, Method::POST, STACKS_PREFIX, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], 200);
    assert_eq!(created["message"], "Successfully");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, shown) = send(&harness, Method::GET, &format!("{STACKS_PREFIX}/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["data"]["status"], "Pending");
    assert_eq!(shown["data"]["config"]["awsSecretAccessKey"], "********");

    let (status, listed) = send(
        &harness,
        Method::GET,
        &format!("{STACKS_PREFIX}/{id}/deployments"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let steps = listed["data"].as_array().unwrap();
    assert_eq!(steps.len(), 2);

    let contracts = steps
        .iter()
        .find(|d| d["step"] == "deploy-l1-contracts")
        .unwrap();
    assert_eq!(contracts["config"]["adminAccount"], "********");
    assert_eq!(contracts["config"]["batcherAccount"], "********");
    assert_eq!(contracts["config"]["l1RpcUrl"], "https://sepolia.example/rpc");

    let did = contracts["id"].as_str().unwrap();
    let (status, shown) = send(
        &harness,
        Method::GET,
        &format!("{STACKS_PREFIX}/{id}/deployments/{did}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["data"]["config"]["sequencerAccount"], "********");
}

#[tokio::test]
async fn test_errors_use_envelope() {
    let harness = &Harness::idle();

    let missing = Uuid::new_v4();
    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("{STACKS_PREFIX}/{missing}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "status": 404, "message": "Stack not found" }));

    let mut invalid = serde_json::to_value(deploy_request()).unwrap();
    invalid["l1RpcUrl"] = json!("not a url");
    let (status, body) = send(&harness, Method::POST, STACKS_PREFIX, Some(invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid l1RpcUrl");

    let (status, body) = send(
        &harness,
        Method::POST,
        STACKS_PREFIX,
        Some(json!({ "chainName": "incomplete" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    for uri in [
        format!("{STACKS_PREFIX}/not-a-uuid"),
        format!("{STACKS_PREFIX}/{missing}/deployments/not-a-uuid"),
    ] {
        let (status, body) = send(&harness, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(
            body["message"].as_str().unwrap().starts_with("Invalid path"),
            "unexpected body {body}"
        );
    }
}

#[tokio::test]
async fn test_integration_routes() {
    let harness = &Harness::idle();
    let body = serde_json::to_value(deploy_request()).unwrap();
    let (_, created) = send(&harness, Method::POST, STACKS_PREFIX, Some(body)).await;
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &harness,
        Method::POST,
        &format!("{STACKS_PREFIX}/{id}/integrations/oracle"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported integration type: oracle");

    // The stack is still pending
    let (status, _) = send(
        &harness,
        Method::POST,
        &format!("{STACKS_PREFIX}/{id}/integrations/bridge"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("{STACKS_PREFIX}/{id}/integrations/register-metadata-dao"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Register metadata dao not found");

    let (status, body) = send(
        &harness,
        Method::GET,
        &format!("{STACKS_PREFIX}/{id}/integrations"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["integration_type"], "bridge");
}
