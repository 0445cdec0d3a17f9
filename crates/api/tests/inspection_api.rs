//! Integration tests for the `/api/v1/inspections` resource.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_bytes, body_json, create_inspection, get, post_json, USER};
use serde_json::json;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Creation and reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_get_returns_draft_at_version_one() {
    let app = common::build_test_app();
    let created = create_inspection(&app.router).await;
    assert_eq!(created["version"], 1);
    assert_eq!(created["status"], "draft");
    assert_eq!(created["type"], "entry");

    let id = created["id"].as_str().unwrap();
    let response = get(&app.router, &format!("/api/v1/inspections/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], created);
}

#[tokio::test]
async fn missing_inspection_returns_404() {
    let app = common::build_test_app();
    let response = get(
        &app.router,
        &format!("/api/v1/inspections/{}", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn request_without_user_header_is_unauthorized() {
    let app = common::build_test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/inspections")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "vehicle_id": uuid::Uuid::new_v4(),
                "inspector_id": USER,
                "type": "routine",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn field_update_bumps_version_and_is_visible() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let response = post_json(
        &app.router,
        &format!("/api/v1/inspections/{id}/updates"),
        json!({
            "path": "sections.engine.oil_level",
            "value": "Bajo",
            "expected_version": 1,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["version"], 2);

    let doc = body_json(get(&app.router, &format!("/api/v1/inspections/{id}")).await).await;
    assert_eq!(doc["data"]["version"], 2);
    assert_eq!(doc["data"]["sections"]["engine"]["oil_level"], "Bajo");
}

#[tokio::test]
async fn stale_update_returns_409_with_versions() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/inspections/{id}/updates");

    let first = post_json(
        &app.router,
        &uri,
        json!({ "path": "summary", "value": "first", "expected_version": 1 }),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let stale = post_json(
        &app.router,
        &uri,
        json!({ "path": "summary", "value": "stale", "expected_version": 1 }),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
    let body = body_json(stale).await;
    assert_eq!(body["code"], "VERSION_CONFLICT");
    assert_eq!(body["expected_version"], 1);
    assert_eq!(body["current_version"], 2);
}

#[tokio::test]
async fn malformed_value_returns_400() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let response = post_json(
        &app.router,
        &format!("/api/v1/inspections/{id}/updates"),
        json!({
            "path": "sections.brakes.items.pads.status",
            "value": "mostly fine",
            "expected_version": 1,
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn update_after_eviction_reloads_from_durable_store() {
    let app = common::build_test_app();
    let id: uuid::Uuid = create_inspection(&app.router).await["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    app.service.hot_store().remove(id);

    let response = post_json(
        &app.router,
        &format!("/api/v1/inspections/{id}/updates"),
        json!({ "path": "summary", "value": "reloaded", "expected_version": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["version"], 2);
}

#[tokio::test]
async fn storage_outage_on_reload_returns_503() {
    let app = common::build_test_app();
    let id: uuid::Uuid = create_inspection(&app.router).await["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    app.service.hot_store().remove(id);
    app.durable.set_available(false);

    let response = get(&app.router, &format!("/api/v1/inspections/{id}")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "STORAGE_UNAVAILABLE");
}

#[tokio::test]
async fn complete_section_route_sets_completion() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let response = post_json(
        &app.router,
        &format!("/api/v1/inspections/{id}/sections/tires/complete"),
        json!({ "expected_version": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["version"], 2);

    let doc = body_json(get(&app.router, &format!("/api/v1/inspections/{id}")).await).await;
    assert!(doc["data"]["sections"]["tires"]["completed_at"].is_string());
}

// ---------------------------------------------------------------------------
// Photos and reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn photo_upload_stores_object_and_appends_url() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!(
            "/api/v1/inspections/{id}/sections/body/items/bumper/photos?expected_version=1"
        ))
        .header("x-user-id", USER)
        .header("content-type", "image/jpeg")
        .body(Body::from(vec![0xFF, 0xD8, 0xFF, 0xE0]))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let data = body_json(response).await["data"].clone();
    assert_eq!(data["version"], 2);
    let url = data["url"].as_str().unwrap();
    assert!(url.starts_with(&format!("/files/inspections/{id}/body/bumper_")));
    assert_eq!(app.objects.len().await, 1);

    let doc = body_json(get(&app.router, &format!("/api/v1/inspections/{id}")).await).await;
    assert_eq!(
        doc["data"]["sections"]["body"]["items"][0]["photos"][0],
        json!(url)
    );
}

#[tokio::test]
async fn report_is_served_as_pdf_without_bumping_version() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let response = get(&app.router, &format!("/api/v1/inspections/{id}/report")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF-1.4"));

    let doc = body_json(get(&app.router, &format!("/api/v1/inspections/{id}")).await).await;
    assert_eq!(doc["data"]["version"], 1);
    assert_eq!(
        doc["data"]["pdf_url"],
        format!("/files/reports/{id}/v1.pdf")
    );
}

#[tokio::test]
async fn photo_upload_without_expected_version_is_a_bad_request() {
    let app = common::build_test_app();
    let id = create_inspection(&app.router).await["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/v1/inspections/{id}/sections/body/items/bumper/photos"))
        .header("x-user-id", USER)
        .body(Body::from(vec![0xFF, 0xD8]))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert!(app.objects.is_empty().await);
}

#[tokio::test]
async fn cors_preflight_allows_the_acting_user_header() {
    let app = common::build_test_app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/inspections")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "x-user-id,content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:5173");
    let allowed = headers["access-control-allow-headers"].to_str().unwrap();
    assert!(allowed.contains("x-user-id"));
}
