//! HTTP-level tests for `/health` and `/api/v1/schedules`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json, Harness};
use orchestra_core::types::Id;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: GET /health reports store and messengers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok() {
    let harness = Harness::new();
    let response = get(harness.app(), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-request-id").is_some());

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["messengers"], json!(["memory"]));
}

// ---------------------------------------------------------------------------
// Test: POST /api/v1/schedules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_pending_schedules() {
    let harness = Harness::new();
    let j1 = harness.job("j1").await;
    let j2 = harness.job("j2").await;
    let cluster = harness.cluster("c1", "cluster-c1").await;

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [j1.id, j2.id] }),
        Some("alice"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["job_id"], j1.id.to_string());
    assert_eq!(data[1]["job_id"], j2.id.to_string());
    for schedule in data {
        assert_eq!(schedule["status"], "PENDING");
        assert_eq!(schedule["owner_id"], "alice");
        assert_eq!(schedule["assigned_cluster_id"], cluster.id.to_string());
    }
    assert_eq!(harness.messenger.published("cluster-c1").len(), 2);
}

#[tokio::test]
async fn create_without_caller_is_unauthorized() {
    let harness = Harness::new();
    let job = harness.job("j1").await;

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [job.id] }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn create_with_no_jobs_fails_validation() {
    let harness = Harness::new();

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [] }),
        Some("alice"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_for_unknown_job_is_not_found() {
    let harness = Harness::new();
    harness.cluster("c1", "cluster-c1").await;

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [Id::new_v4()] }),
        Some("alice"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "JOB_NOT_FOUND");
}

#[tokio::test]
async fn create_without_clusters_is_unprocessable() {
    let harness = Harness::new();
    let job = harness.job("j1").await;

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [job.id] }),
        Some("alice"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_CLUSTER_AVAILABLE");
    assert!(json["error"].as_str().unwrap().contains(&job.id.to_string()));
}

#[tokio::test]
async fn publish_failure_is_an_opaque_500() {
    let harness = Harness::new();
    let job = harness.job("j1").await;
    harness.cluster("c1", "cluster-c1").await;
    harness.messenger.set_fail_publishes(true);

    let response = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [job.id] }),
        Some("alice"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/schedules and /api/v1/schedules/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_schedule_can_be_fetched_and_queried() {
    let harness = Harness::new();
    let j1 = harness.job("j1").await;
    let j2 = harness.job("j2").await;
    harness.cluster("c1", "cluster-c1").await;

    let created = post_json(
        harness.app(),
        "/api/v1/schedules",
        json!({ "job_ids": [j1.id, j2.id] }),
        Some("alice"),
    )
    .await;
    let created = body_json(created).await;
    let id = created["data"][0]["id"].as_str().unwrap().to_string();

    let response = get(harness.app(), &format!("/api/v1/schedules/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["job_id"], j1.id.to_string());

    let response = get(harness.app(), &format!("/api/v1/schedules?job_id={}", j2.id)).await;
    let listed = body_json(response).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"][0]["job_id"], j2.id.to_string());

    let response = get(harness.app(), "/api/v1/schedules?owner_id=bob").await;
    assert!(body_json(response).await["data"].as_array().unwrap().is_empty());

    let response = get(harness.app(), "/api/v1/schedules?status=PENDING").await;
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_schedule_is_not_found() {
    let harness = Harness::new();
    let response = get(harness.app(), &format!("/api/v1/schedules/{}", Id::new_v4())).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}
