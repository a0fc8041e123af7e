// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};

use super::support::{body_json, body_string, empty_request, TestApp};

#[tokio::test]
async fn test_landing_page_served() {
    let app = TestApp::new().await;

    let response = app.send(empty_request(Method::GET, "/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));
    assert!(body_string(response).await.contains("/predict"));
}

#[tokio::test]
async fn test_health_reports_model() {
    let app = TestApp::new().await;

    let response = app.send(empty_request(Method::GET, "/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], detection_node::version::VERSION_NUMBER);
    assert_eq!(body["model"]["source"], "local");
    assert_eq!(body["model"]["key"], "best.pt");
    assert!(body.get("activeTrainingJob").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new().await;

    let response = app.send(empty_request(Method::GET, "/v1/models")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight_on_predict() {
    let app = TestApp::new().await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/predict")
        .header(header::ORIGIN, "http://example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}
