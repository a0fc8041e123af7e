// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::{Body, Bytes},
    extract::{Path as UrlPath, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::StreamExt;
use detection_node::storage::{HttpObjectStore, HttpStoreConfig, ObjectStore, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
struct FakeBucketServer {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

// GET also answers HEAD requests
async fn get_object(
    State(server): State<FakeBucketServer>,
    UrlPath((bucket, key)): UrlPath<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if bucket == "broken" {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let data = server
        .objects
        .lock()
        .await
        .get(&format!("{}/{}", bucket, key))
        .cloned();
    let Some(data) = data else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if bucket == "slow" {
        // Trickle the body out in chunks with a pause before each one
        let chunks: Vec<Vec<u8>> = data.chunks(4).map(<[u8]>::to_vec).collect();
        let stream = futures::stream::iter(chunks).then(|chunk| async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            Ok::<_, std::io::Error>(Bytes::from(chunk))
        });
        return Body::from_stream(stream).into_response();
    }

    (StatusCode::OK, data).into_response()
}

async fn put_object(
    State(server): State<FakeBucketServer>,
    UrlPath((bucket, key)): UrlPath<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    server
        .objects
        .lock()
        .await
        .insert(format!("{}/{}", bucket, key), body.to_vec());
    StatusCode::OK
}

async fn spawn_server() -> (String, FakeBucketServer) {
    let server = FakeBucketServer::default();
    let app = Router::new()
        .route("/:bucket/*key", get(get_object).put(put_object))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), server)
}

fn store(endpoint: &str, api_key: Option<&str>) -> HttpObjectStore {
    store_with_connect_timeout(endpoint, api_key, 5)
}

fn store_with_connect_timeout(
    endpoint: &str,
    api_key: Option<&str>,
    connect_timeout_seconds: u64,
) -> HttpObjectStore {
    HttpObjectStore::new(HttpStoreConfig {
        endpoint: endpoint.to_string(),
        api_key: api_key.map(str::to_string),
        connect_timeout_seconds,
    })
    .unwrap()
}

#[tokio::test]
async fn test_presence_check() {
    let (endpoint, server) = spawn_server().await;
    server
        .objects
        .lock()
        .await
        .insert("models/best.pt".to_string(), b"weights".to_vec());
    let store = store(&endpoint, Some(TOKEN));

    assert!(store.is_model_present("models", "best.pt").await.unwrap());
    assert!(!store.is_model_present("models", "missing.pt").await.unwrap());
}

#[tokio::test]
async fn test_download_writes_final_file_only() {
    let (endpoint, server) = spawn_server().await;
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    server
        .objects
        .lock()
        .await
        .insert("models/weights/best.pt".to_string(), payload.clone());

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("best.pt");
    store(&endpoint, Some(TOKEN))
        .download_object("weights/best.pt", "models", &target)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), payload);
    assert!(!dir.path().join("best.pt.part").exists());
}

#[tokio::test]
async fn test_slow_download_outlasts_connect_timeout() {
    let (endpoint, server) = spawn_server().await;
    server
        .objects
        .lock()
        .await
        .insert("slow/best.pt".to_string(), b"weights-arrive-slowly".to_vec());

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("best.pt");

    // Six chunks at 600ms each take well over the one second allowed for connecting
    store_with_connect_timeout(&endpoint, Some(TOKEN), 1)
        .download_object("best.pt", "slow", &target)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"weights-arrive-slowly");
}

#[tokio::test]
async fn test_download_missing_object_leaves_nothing() {
    let (endpoint, _server) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("best.pt");

    let err = store(&endpoint, Some(TOKEN))
        .download_object("best.pt", "models", &target)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_upload_object() {
    let (endpoint, server) = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("best.pt");
    std::fs::write(&source, b"trained").unwrap();

    let store = store(&endpoint, Some(TOKEN));
    store
        .upload_object(&source, "models", "best.pt")
        .await
        .unwrap();

    assert_eq!(
        server.objects.lock().await.get("models/best.pt").cloned(),
        Some(b"trained".to_vec())
    );
    assert!(store.is_model_present("models", "best.pt").await.unwrap());
}

#[tokio::test]
async fn test_missing_credentials_is_auth_error() {
    let (endpoint, _server) = spawn_server().await;

    let err = store(&endpoint, None)
        .is_model_present("models", "best.pt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AuthError(_)));

    let err = store(&endpoint, Some("wrong"))
        .is_model_present("models", "best.pt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AuthError(_)));
}

#[tokio::test]
async fn test_server_failure_is_server_error() {
    let (endpoint, _server) = spawn_server().await;

    let err = store(&endpoint, Some(TOKEN))
        .is_model_present("broken", "best.pt")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::ServerError(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = store(&format!("http://{}", addr), Some(TOKEN))
        .is_model_present("models", "best.pt")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NetworkError(_)));
}
