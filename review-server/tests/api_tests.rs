//! Integration tests for review-server API endpoints
//!
//! Tests cover:
//! - Health check
//! - Review listing, detail and validation against SQLite and sample data
//! - Fallback to sample data when the warehouse is down
//! - Metrics, similar reviews, recommendations and diagnostics
//! - Frontend serving

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use helpers::*;
use review_server::{build_router, AppState};

/// Test helper: Create app backed by the seeded SQLite warehouse
async fn setup_app() -> Router {
    let (service, _wh) = seeded_service().await;
    build_router(AppState::new(service))
}

/// Test helper: Create app whose warehouse rejects every statement
fn setup_failing_app() -> Router {
    let service = service_with(Arc::new(FailingWarehouse), None, false);
    build_router(AppState::new(service))
}

/// Test helper: Create request
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create JSON request
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn ids(body: &Value) -> Vec<String> {
    let mut ids: Vec<String> = body
        .as_array()
        .expect("Should be an array")
        .iter()
        .map(|r| r["response_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_healthcheck() {
    let app = setup_failing_app();

    let response = app
        .oneshot(test_request("GET", "/api/v1/healthcheck"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

// =============================================================================
// Reviews
// =============================================================================

#[tokio::test]
async fn test_list_reviews_from_warehouse() {
    let app = setup_app().await;

    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["R1", "R2", "R3", "R4"]);
    let r2 = body
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["response_id"] == "R2")
        .unwrap();
    assert_eq!(r2["status"], "recommended");
    assert_eq!(r2["category_sentiments"][0]["category"], "Food");
    assert_eq!(r2["relevant_comments"], r2["question_response"]);
}

#[tokio::test]
async fn test_list_reviews_mock_data() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/v1/reviews?use_databricks=false"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 6);

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/v1/reviews?use_databricks=false&status=random_sample&store_id=STORE_001",
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["R001", "R003", "R006"]);
}

#[tokio::test]
async fn test_list_reviews_falls_back_to_mock_data() {
    let app = setup_failing_app();

    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews?status=completed"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["C001"]);
}

#[tokio::test]
async fn test_get_review_detail() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/v1/reviews/R1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["response_id"], "R1");
    assert_eq!(body["validation_status"], "pending");
    assert_eq!(body["category_sentiments"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews/NOPE"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_review_mock_and_fallback() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews/NOPE?use_databricks=false"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let app = setup_failing_app();
    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews/C001"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["validation_status"], "completed");
    assert_eq!(body["accuracy_score"], 0.95);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_validate_accept_then_listed_as_completed() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R1/validate",
            json!({"decision": "accept"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["decision"], "accept");
    assert_eq!(body["corrections_made"], 0);
    assert_eq!(
        body["message"],
        "Review R1 has been accepted and saved to evaluation table"
    );

    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews?status=completed"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["R1"]);
    assert_eq!(body[0]["status"], "completed");
}

#[tokio::test]
async fn test_validate_override_with_loose_score() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R2/validate",
            json!({
                "decision": "override",
                "updated_labels": {"overall_sentiment_score": "1.0", "overall_sentiment_label": "Positive"},
                "corrections_made": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["corrections_made"], 1);

    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews/R2"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["validation_status"], "completed");
    assert_eq!(body["overall_sentiment_score"], 1);
}

#[tokio::test]
async fn test_validate_skip_and_unknown() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R3/validate",
            json!({"decision": "skip"}),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["message"],
        "Review R3 has been skipped (no evaluation written)"
    );
    assert!(body.get("corrections_made").is_none());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/NOPE/validate",
            json!({"decision": "accept"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R1/validate",
            json!({"decision": "approve"}),
        ))
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_validate_mock_mode() {
    let app = setup_failing_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R002/validate?use_databricks=false",
            json!({"decision": "override"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Review R002 has been overridden");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/X9/validate?use_databricks=false",
            json!({"decision": "accept"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validate_write_failure_is_500() {
    let app = setup_failing_app();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R1/validate",
            json!({"decision": "accept"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Validation failed"));
}

// =============================================================================
// Refresh and metrics
// =============================================================================

#[tokio::test]
async fn test_refresh_random_sample() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/v1/refresh-random-sample?limit=3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["sample_size"], 3);
    assert_eq!(
        body["message"],
        "Generated new random sample of 3 unvalidated reviews"
    );

    let response = app
        .oneshot(test_request(
            "POST",
            "/api/v1/refresh-random-sample?use_databricks=false",
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["sample_size"], 6);
    assert_eq!(
        body["message"],
        "Generated new random sample of 6 reviews (mock data)"
    );
}

#[tokio::test]
async fn test_refresh_failure_is_500() {
    let app = setup_failing_app();
    let response = app
        .oneshot(test_request("POST", "/api/v1/refresh-random-sample"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_metrics_overview() {
    let app = setup_app().await;
    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/v1/metrics/overview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_reviews"], 4);
    assert_eq!(body["completed_today"], 0);
    assert_eq!(body["average_accuracy"], 0.0);

    let response = app
        .oneshot(test_request("GET", "/api/v1/metrics/overview?use_databricks=false"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_reviews"], 8);
    assert_eq!(body["average_accuracy"], 0.87);
}

#[tokio::test]
async fn test_metrics_degrade_when_warehouse_down() {
    let app = setup_failing_app();
    let response = app
        .oneshot(test_request("GET", "/api/v1/metrics/overview"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total_reviews"], 0);
    assert_eq!(body["corrections_per_review"], 0.0);
}

// =============================================================================
// Similar reviews and recommendations
// =============================================================================

#[tokio::test]
async fn test_similar_reviews() {
    let wh = seeded_warehouse().await;
    let service = service_with(wh, Some(Arc::new(FakeIndex::ranked())), false);
    let app = build_router(AppState::new(service));

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/v1/reviews/R1/similar?limit=5"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["R2", "R4"]);
    assert_eq!(body[0]["status"], "recommended");

    let response = app
        .oneshot(test_request(
            "GET",
            "/api/v1/reviews/R1/similar?use_databricks=false",
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_similar_reviews_without_index() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/v1/reviews/R1/similar"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!([]));
}

#[tokio::test]
async fn test_recommendations_disabled() {
    let app = setup_app().await;

    for uri in ["/api/v1/recommendations", "/api/v1/recommendations/R1"] {
        let response = app.clone().oneshot(test_request("GET", uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extract_json(response.into_body()).await, json!([]));
    }
}

#[tokio::test]
async fn test_recommendations_after_correction() {
    let wh = seeded_warehouse().await;
    let service = service_with(wh, Some(Arc::new(FakeIndex::ranked())), true);
    let app = build_router(AppState::new(service));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/reviews/R1/validate",
            json!({
                "decision": "override",
                "updated_labels": {"overall_sentiment_score": -1},
                "corrections_made": 1
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/v1/recommendations"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body[0]["source_review_id"], "R1");
    assert_eq!(body[0]["recommendation_count"], 2);
    assert_eq!(body[0]["recommended_reviews"][0]["response_id"], "R2");
    assert_eq!(body[0]["recommended_reviews"][0]["similarity_score"], 0.9);

    let response = app
        .oneshot(test_request("GET", "/api/v1/recommendations/R1"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(ids(&body), vec!["R2", "R4"]);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[tokio::test]
async fn test_connection_report() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/v1/test-connection"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["connection_status"], "success");
    assert_eq!(body["backend"], "sqlite");
    assert_eq!(body["test_query_result"][0]["test_value"], 1);
    assert_eq!(body["vector_search_status"], "not_available");
    assert!(body["table_schema"].as_array().unwrap().len() >= 16);

    let app = setup_failing_app();
    let response = app
        .oneshot(test_request("GET", "/api/v1/test-connection"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["connection_status"], "failed");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_evaluation_table_report() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/v1/test-evaluation-table"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["table_exists"], true);
    assert_eq!(body["row_count"], 0);

    let app = setup_failing_app();
    let response = app
        .oneshot(test_request("GET", "/api/v1/test-evaluation-table"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["table_exists"], false);
}

// =============================================================================
// Frontend
// =============================================================================

#[tokio::test]
async fn test_root_banner_without_frontend() {
    let app = setup_failing_app();

    let response = app.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Backend is running! Frontend build not found.");

    let response = app
        .oneshot(test_request("GET", "/api/debug/frontend"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["build_dir_exists"], false);
}

#[tokio::test]
async fn test_serves_frontend_build() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>reviews</html>").unwrap();

    let service = service_with(Arc::new(FailingWarehouse), None, false);
    let app = build_router(
        AppState::new(service).with_frontend_dir(Some(dir.path().to_path_buf())),
    );

    let response = app.clone().oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"<html>reviews</html>");

    // Client-side routes fall back to index.html
    let response = app
        .clone()
        .oneshot(test_request("GET", "/dashboard/queue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(test_request("GET", "/api/debug/frontend"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["build_dir_exists"], true);
    assert_eq!(body["assets"], json!(["index.html"]));
}
