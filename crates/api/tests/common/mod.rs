#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use vinspect_api::config::ServerConfig;
use vinspect_api::router::build_app_router;
use vinspect_api::state::AppState;
use vinspect_db::{MemoryInspectionStore, MemoryObjectStore};
use vinspect_events::InspectionBus;
use vinspect_live::{HotStore, InspectionService, LiveConfig};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        object_storage_root: "./storage".to_string(),
        object_storage_base_url: "/files".to_string(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub service: Arc<InspectionService>,
    pub durable: Arc<MemoryInspectionStore>,
    pub objects: Arc<MemoryObjectStore>,
}

/// Build the full application router over in-process stores.
///
/// Uses the same middleware stack as `main.rs`.
pub fn build_test_app() -> TestApp {
    let live = LiveConfig::default();
    let durable = Arc::new(MemoryInspectionStore::new());
    let objects = Arc::new(MemoryObjectStore::new("/files"));
    let service = Arc::new(InspectionService::new(
        Arc::new(HotStore::new(live.hot_ttl)),
        InspectionBus::new(live.subscriber_queue_capacity),
        durable.clone(),
        objects.clone(),
        live,
    ));

    let state = AppState {
        service: Arc::clone(&service),
        config: Arc::new(test_config()),
    };

    TestApp {
        router: build_app_router(state),
        service,
        durable,
        objects,
    }
}

pub const USER: &str = "0190a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b";

/// Send a request with the acting-user header set.
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", USER);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Create an inspection through the API and return its JSON.
pub async fn create_inspection(app: &Router) -> Value {
    let response = post_json(
        app,
        "/api/v1/inspections",
        serde_json::json!({
            "vehicle_id": uuid::Uuid::new_v4(),
            "inspector_id": USER,
            "type": "entry",
        }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}
