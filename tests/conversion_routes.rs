mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use heritage_relay::config::{AppConfig, MeshyConfig, StabilityConfig};
use serde_json::json;

use common::{
    json_request, multipart_request, read_json, record, recorded, spawn_upstream, FormPart,
    RecordLog, TestRelay, PNG_PIXEL,
};

const FAKE_GLB: &[u8] = b"glTF\x02\x00\x00\x00fake-model-bytes";

async fn spawn_stability(
    status: StatusCode,
    reply: &'static [u8],
) -> (String, RecordLog, tokio::task::JoinHandle<()>) {
    let log: RecordLog = Arc::new(Mutex::new(Vec::new()));
    let handler_log = Arc::clone(&log);
    let app = Router::new().fallback(move |request: Request<Body>| {
        let log = Arc::clone(&handler_log);
        async move {
            record(&log, request).await;
            (status, reply).into_response()
        }
    });
    let (base_url, server) = spawn_upstream(app).await;
    (base_url, log, server)
}

fn relay_with_stability(base_url: &str) -> TestRelay {
    let mut config = AppConfig::default();
    config.services.stability = Some(StabilityConfig {
        endpoint: format!("{base_url}/v2beta/3d/stable-fast-3d"),
        api_key: "sk-stability".to_string(),
        ..StabilityConfig::default()
    });
    TestRelay::new(config)
}

#[tokio::test]
async fn test_stability_conversion_stores_glb() {
    let (base_url, log, server) = spawn_stability(StatusCode::OK, FAKE_GLB).await;
    let relay = relay_with_stability(&base_url);

    let response = relay
        .send(multipart_request(
            "/api/convert",
            &[FormPart::image("vase.png", "image/png", PNG_PIXEL)],
        ))
        .await;
    let (status, payload) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["success"], true);
    assert_eq!(
        payload["message"],
        "3D model generated successfully using Stability AI"
    );
    let glb_url = payload["glb_url"].as_str().expect("glb_url");
    let file_name = glb_url.strip_prefix("/outputs/").expect("outputs prefix");
    assert!(file_name.starts_with("stable_"));
    assert!(file_name.ends_with(".glb"));
    let stored = std::fs::read(relay.outputs.path().join(file_name)).expect("stored model");
    assert_eq!(stored, FAKE_GLB);

    let calls = recorded(&log);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/v2beta/3d/stable-fast-3d");
    assert_eq!(calls[0].header("authorization"), Some("Bearer sk-stability"));
    assert_eq!(
        calls[0].header("stability-client-id"),
        Some("cultural-web-app")
    );
    let form = calls[0].body_text();
    assert!(form.contains("name=\"image\""));
    assert!(form.contains("name=\"texture_resolution\""));
    assert!(form.contains("name=\"remesh\""));

    server.abort();
}

#[tokio::test]
async fn test_stability_failure_is_not_ok() {
    let (base_url, _log, server) = spawn_stability(
        StatusCode::BAD_REQUEST,
        br#"{"name":"bad_request","errors":["image: unsupported dimensions"]}"#,
    )
    .await;
    let relay = relay_with_stability(&base_url);

    let response = relay
        .send(multipart_request(
            "/api/convert",
            &[FormPart::image("vase.png", "image/png", PNG_PIXEL)],
        ))
        .await;
    let (status, payload) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(payload["success"], false);
    assert_eq!(payload["error"], "Failed to convert to 3D model");
    assert!(payload["details"]
        .as_str()
        .is_some_and(|details| details.contains("unsupported dimensions")));
    let stored = std::fs::read_dir(relay.outputs.path())
        .expect("outputs dir")
        .count();
    assert_eq!(stored, 0);

    server.abort();
}

#[tokio::test]
async fn test_stability_rate_limit_is_retried_then_surfaced() {
    let (base_url, log, server) = spawn_stability(
        StatusCode::TOO_MANY_REQUESTS,
        br#"{"message":"slow down"}"#,
    )
    .await;
    let relay = relay_with_stability(&base_url);

    let response = relay
        .send(multipart_request(
            "/api/convert",
            &[FormPart::image("vase.png", "image/png", PNG_PIXEL)],
        ))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(recorded(&log).len(), 3);

    server.abort();
}

#[tokio::test]
async fn test_convert_rejects_unknown_content_type() {
    let relay = TestRelay::new(AppConfig::default());
    let request = Request::builder()
        .method("POST")
        .uri("/api/convert")
        .header("content-type", "text/plain")
        .body(Body::from("vase"))
        .expect("build request");

    let (status, payload) = read_json(relay.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["success"], false);
}

async fn spawn_meshy() -> (String, RecordLog, tokio::task::JoinHandle<()>) {
    let log: RecordLog = Arc::new(Mutex::new(Vec::new()));
    let create_log = Arc::clone(&log);
    let app = Router::new()
        .route(
            "/openapi/v1/image-to-3d",
            post(move |request: Request<Body>| {
                let log = Arc::clone(&create_log);
                async move {
                    record(&log, request).await;
                    Json(json!({"result": "018a210d-8ba4-705c-b111-1f1776f7f578"}))
                }
            }),
        )
        .route(
            "/openapi/v1/image-to-3d/{task_id}",
            get(|Path(task_id): Path<String>| async move {
                Json(json!({
                    "id": task_id,
                    "status": "SUCCEEDED",
                    "progress": 100,
                    "model_urls": {"glb": "https://assets.meshy.ai/model.glb"}
                }))
            }),
        );
    let (base_url, server) = spawn_upstream(app).await;
    (base_url, log, server)
}

fn relay_with_meshy(base_url: &str) -> TestRelay {
    let mut config = AppConfig::default();
    config.services.meshy = Some(MeshyConfig {
        endpoint: format!("{base_url}/openapi/v1/image-to-3d"),
        api_key: "msy-key".to_string(),
        ..MeshyConfig::default()
    });
    TestRelay::new(config)
}

#[tokio::test]
async fn test_meshy_task_lifecycle() {
    let (base_url, log, server) = spawn_meshy().await;
    let relay = relay_with_meshy(&base_url);

    let response = relay
        .send(json_request(
            "/api/convert",
            &json!({"image_url": "https://example.org/vase.jpg"}),
        ))
        .await;
    let (status, payload) = read_json(response).await;
    assert_eq!(status, StatusCode::OK);
    let task_id = payload["taskId"].as_str().expect("taskId").to_string();
    assert_eq!(task_id, "018a210d-8ba4-705c-b111-1f1776f7f578");

    let calls = recorded(&log);
    assert_eq!(calls[0].header("authorization"), Some("Bearer msy-key"));
    let sent = calls[0].json();
    assert_eq!(sent["image_url"], "https://example.org/vase.jpg");
    assert_eq!(sent["enable_pbr"], true);

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/result/{task_id}"))
        .body(Body::empty())
        .expect("build request");
    let (status, payload) = read_json(relay.send(request).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], "SUCCEEDED");
    assert_eq!(payload["id"], task_id.as_str());
    assert_eq!(payload["model_urls"]["glb"], "https://assets.meshy.ai/model.glb");

    server.abort();
}

#[tokio::test]
async fn test_meshy_requires_image_url() {
    let (base_url, log, server) = spawn_meshy().await;
    let relay = relay_with_meshy(&base_url);

    let response = relay
        .send(json_request("/api/convert", &json!({"image_url": ""})))
        .await;
    let (status, payload) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "Image URL is required");
    assert!(recorded(&log).is_empty());

    server.abort();
}

#[tokio::test]
async fn test_result_rejects_unsafe_task_id() {
    let relay = relay_with_meshy("http://127.0.0.1:9");
    let request = Request::builder()
        .method("GET")
        .uri("/api/result/abc%2E%2E")
        .body(Body::empty())
        .expect("build request");

    let (status, payload) = read_json(relay.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "Invalid task id");
}

async fn spawn_slow_meshy(
    delay: Duration,
) -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let creations = Arc::new(AtomicUsize::new(0));
    let polls = Arc::new(AtomicUsize::new(0));
    let create_count = Arc::clone(&creations);
    let poll_count = Arc::clone(&polls);
    let app = Router::new()
        .route(
            "/openapi/v1/image-to-3d",
            post(move || {
                let count = Arc::clone(&create_count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    Json(json!({"result": "late-task"}))
                }
            }),
        )
        .route(
            "/openapi/v1/image-to-3d/{task_id}",
            get(move || {
                let count = Arc::clone(&poll_count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    Json(json!({"status": "IN_PROGRESS"}))
                }
            }),
        );
    let (base_url, server) = spawn_upstream(app).await;
    (base_url, creations, polls, server)
}

fn relay_with_short_timeout(base_url: &str) -> TestRelay {
    let mut config = AppConfig::default();
    config.server.timeout = 1;
    config.services.meshy = Some(MeshyConfig {
        endpoint: format!("{base_url}/openapi/v1/image-to-3d"),
        api_key: "msy-key".to_string(),
        ..MeshyConfig::default()
    });
    TestRelay::new(config)
}

#[tokio::test]
async fn test_task_creation_is_not_resent_after_timeout() {
    let (base_url, creations, _polls, server) = spawn_slow_meshy(Duration::from_secs(2)).await;
    let relay = relay_with_short_timeout(&base_url);

    let started = Instant::now();
    let response = relay
        .send(json_request(
            "/api/convert",
            &json!({"image_url": "https://example.org/vase.jpg"}),
        ))
        .await;
    let (status, payload) = read_json(response).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(payload["error"], "Failed to initiate 3D model conversion");
    assert_eq!(creations.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_secs(2));

    server.abort();
}

#[tokio::test]
async fn test_result_poll_is_retried_after_timeout() {
    let (base_url, _creations, polls, server) = spawn_slow_meshy(Duration::from_secs(2)).await;
    let relay = relay_with_short_timeout(&base_url);

    let request = Request::builder()
        .method("GET")
        .uri("/api/result/late-task")
        .body(Body::empty())
        .expect("build request");
    let (status, payload) = read_json(relay.send(request).await).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(payload["error"], "Failed to fetch 3D model result");
    assert_eq!(polls.load(Ordering::SeqCst), 3);

    server.abort();
}
