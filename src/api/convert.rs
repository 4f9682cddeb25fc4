//! Image to 3D conversion.
//!
//! Two upstreams share `/api/convert`: an uploaded photo goes to Stability
//! AI and comes back as a GLB written to the output store, while a JSON body
//! with a public `image_url` starts an asynchronous Meshy task whose status
//! is polled through `/api/result/{task_id}`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::Request;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::common::{bearer_headers, read_json_body, read_upload, respond, service};
use crate::error::{into_axum_response, RelayError};
use crate::protocol::meshy::{is_valid_task_id, MeshyCreateTask, MeshyCreateTaskResponse};
use crate::protocol::stability::{self, CLIENT_ID_HEADER};
use crate::state::AppState;
use crate::transport::{read_success_body, read_success_json};

const CONVERT_MESSAGE: &str = "Failed to convert to 3D model";
const INITIATE_MESSAGE: &str = "Failed to initiate 3D model conversion";
const RESULT_MESSAGE: &str = "Failed to fetch 3D model result";
const STABILITY_SUCCESS_MESSAGE: &str = "3D model generated successfully using Stability AI";
const MESHY_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct StabilityConvertResponse {
    success: bool,
    glb_url: String,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
struct MeshyConvertRequest {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeshyConvertResponse {
    task_id: String,
}

enum ConvertBody {
    Upload,
    ImageUrl,
    Unsupported,
}

fn classify(request: &Request<Body>) -> ConvertBody {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim_start()
        .to_ascii_lowercase();
    if content_type.starts_with("multipart/form-data") {
        ConvertBody::Upload
    } else if content_type.starts_with("application/json") {
        ConvertBody::ImageUrl
    } else {
        ConvertBody::Unsupported
    }
}

/// `POST /api/convert`.
pub async fn handler(state: Arc<AppState>, request: Request<Body>) -> Response {
    match classify(&request) {
        ConvertBody::Upload => respond(
            convert_with_stability(&state, request).await,
            CONVERT_MESSAGE,
        ),
        ConvertBody::ImageUrl => respond(
            start_meshy_task(&state, request.into_body()).await,
            INITIATE_MESSAGE,
        ),
        ConvertBody::Unsupported => into_axum_response(
            &RelayError::InvalidRequest(
                "Send an image as multipart/form-data or an image_url as JSON".to_string(),
            ),
            CONVERT_MESSAGE,
        ),
    }
}

async fn convert_with_stability(
    state: &AppState,
    request: Request<Body>,
) -> Result<StabilityConvertResponse, RelayError> {
    let mut form = read_upload(request, state.config.server.max_upload_bytes).await?;
    let image = form.take_image()?;
    let config = service(
        state.config.services.stability.as_ref(),
        "Stability 3D conversion service",
    )?;

    let headers = bearer_headers(
        &config.api_key,
        &[(CLIENT_ID_HEADER, config.client_id.as_str())],
    )?;
    let response = state
        .transport
        .post_multipart(&config.endpoint, &headers, || {
            stability::build_form(
                image.bytes.clone(),
                &image.file_name,
                &image.mime_type,
                config,
            )
        })
        .await?;
    let model = read_success_body(response).await?;
    if !stability::is_glb(&model) {
        tracing::warn!(size = model.len(), "stability response is not a binary glTF");
    }

    let stored = state.outputs.save("stable", "glb", &model).await?;
    tracing::info!(file = %stored.file_name, size = model.len(), "stored 3D model");
    Ok(StabilityConvertResponse {
        success: true,
        glb_url: stored.url,
        message: STABILITY_SUCCESS_MESSAGE,
    })
}

async fn start_meshy_task(
    state: &AppState,
    body: Body,
) -> Result<MeshyConvertResponse, RelayError> {
    let request: MeshyConvertRequest = read_json_body(body, MESHY_BODY_LIMIT).await?;
    let image_url = request
        .image_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("Image URL is required".to_string()))?;
    let config = service(
        state.config.services.meshy.as_ref(),
        "Meshy 3D conversion service",
    )?;

    let headers = bearer_headers(&config.api_key, &[])?;
    let response = state
        .transport
        .post_json(
            &config.endpoint,
            &headers,
            &MeshyCreateTask::new(image_url, config),
        )
        .await?;
    let created: MeshyCreateTaskResponse = read_success_json(response).await?;
    tracing::info!(task_id = %created.result, "started 3D conversion task");
    Ok(MeshyConvertResponse {
        task_id: created.result,
    })
}

/// `GET /api/result/{task_id}`: Meshy task status, passed through unchanged.
pub async fn result_handler(state: Arc<AppState>, task_id: &str) -> Response {
    respond(fetch_meshy_result(&state, task_id).await, RESULT_MESSAGE)
}

async fn fetch_meshy_result(state: &AppState, task_id: &str) -> Result<Value, RelayError> {
    if !is_valid_task_id(task_id) {
        return Err(RelayError::InvalidRequest("Invalid task id".to_string()));
    }
    let config = service(
        state.config.services.meshy.as_ref(),
        "Meshy 3D conversion service",
    )?;

    let url = format!("{}/{task_id}", config.endpoint.trim_end_matches('/'));
    let headers = bearer_headers(&config.api_key, &[])?;
    let response = state.transport.get(&url, &headers).await?;
    read_success_json(response).await
}
