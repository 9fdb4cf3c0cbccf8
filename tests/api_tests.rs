mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::TestApp;
use serde_json::Value;
use tower::util::ServiceExt;

async fn raw_get(app: &TestApp, uri: &str) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let response = raw_get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let app = TestApp::new();
    let response = raw_get(&app, "/health").await;
    assert!(response.headers().contains_key("x-request-id"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/courses")
                .header("x-request-id", "trace-me-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me-123");
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = TestApp::new();
    let response = raw_get(&app, "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/auth/register",
        "/courses",
        "/quizzes/{id}/attempts",
        "/attempts/{id}/submit",
        "/payments/webhook",
        "/me/flashcards/due",
        "/upload/presigned",
        "/admin/stats",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();
    let response = raw_get(&app, "/no-such-route").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
