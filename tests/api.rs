//! HTTP surface exercised through the router without binding a socket

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use balance_reconciler::{api, config::Config, service::BalanceService};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let cfg = Config::default();
    api::router(BalanceService::from_config(&cfg), &cfg)
}

fn misread_chain() -> Value {
    json!({
        "x0": [10.0, 10.0, 4.0, 10.0],
        "a": [[1.0, -1.0, 0.0, 0.0], [0.0, 1.0, -1.0, 0.0], [0.0, 0.0, 1.0, -1.0]],
        "b": [0.0, 0.0, 0.0],
        "measurability": [1.0, 1.0, 1.0, 1.0],
        "tolerance": [0.2, 0.2, 0.2, 0.2],
        "lowerMetrologic": [0.0, 0.0, 0.0, 0.0],
        "upperMetrologic": [20.0, 20.0, 20.0, 20.0],
        "names": ["feed", "transfer", "pump", "product"]
    })
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_healthz() {
    let response = app()
        .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reconcile_closes_balance() {
    let (status, body) = post("/api/v1/balance", misread_chain()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["data"]["disbalance"].as_f64().unwrap() < 1e-6);
    assert!(body["data"]["disbalanceOriginal"].as_f64().unwrap() > 1.0);
    assert_eq!(body["data"]["x"].as_array().unwrap().len(), 4);
    assert_eq!(body["metadata"]["solver"], "goldfarb-idnani");
}

#[tokio::test]
async fn test_missing_argument_is_bad_request() {
    let mut input = misread_chain();
    input.as_object_mut().unwrap().remove("x0");
    let (status, body) = post("/api/v1/balance", input).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");
    assert_eq!(body["details"], "x0");
}

#[tokio::test]
async fn test_infeasible_bounds_unprocessable() {
    let mut input = misread_chain();
    input["upperMetrologic"] = json!([20.0, 20.0, 5.0, 20.0]);
    input["lowerMetrologic"] = json!([0.0, 15.0, 0.0, 0.0]);
    let (status, body) = post("/api/v1/balance", input).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Unprocessable");
}

#[tokio::test]
async fn test_global_test_value() {
    let (status, body) = post("/api/v1/balance/gt", misread_chain()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_f64().unwrap() >= 1.0);
}

#[tokio::test]
async fn test_glr_ranked_hypotheses() {
    let (status, body) = post("/api/v1/balance/glr?maxBranching=2&maxDepth=3", misread_chain()).await;
    assert_eq!(status, StatusCode::OK);
    let hypotheses = body["data"].as_array().unwrap();
    assert_eq!(body["metadata"]["totalCount"], hypotheses.len());
    let values: Vec<f64> = hypotheses
        .iter()
        .map(|h| h["testValue"].as_f64().unwrap())
        .collect();
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    assert!(hypotheses
        .iter()
        .any(|h| h["flowsInfo"][0]["name"] == "pump"));
}

#[tokio::test]
async fn test_glr_limits_validated() {
    let (status, body) = post("/api/v1/balance/glr?maxBranching=0", misread_chain()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn test_glr_short_bounds_rejected() {
    let mut input = misread_chain();
    input["lowerMetrologic"] = json!([0.0]);
    let (status, body) = post("/api/v1/balance/glr", input).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidArgument");
    assert_eq!(body["details"], "lower");
}

#[tokio::test]
async fn test_glr_best_single_chain() {
    let (status, body) = post("/api/v1/balance/glrbest", misread_chain()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["totalCount"], 1);
    let best = &body["data"][0];
    assert_eq!(best["flowsInfo"][0]["info"], "1 -> 2");
    assert_eq!(best["flowsInfo"][0]["number"], 2);
    assert_eq!(best["flowsToAdd"][0]["name"], "pump (additional)");
    assert_eq!(best["flowsToAdd"][0]["varType"], "FLOW");
    assert_eq!(best["flowsToAdd"][0]["metrologicRange"]["min"], -4.0);
}
