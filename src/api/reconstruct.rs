use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

use super::common::{
    api_key_headers, bearer_headers, read_upload, respond, service, UploadedImage,
};
use super::prompts::RESTORATION_PROMPT;
use crate::config::RestorationBackend;
use crate::error::RelayError;
use crate::protocol::cloudinary::{self, CloudinaryUploadResponse};
use crate::protocol::gemini::{GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse};
use crate::protocol::photai::{parse_color_flag, PhotAiRestoreRequest};
use crate::protocol::stability::CLIENT_ID_HEADER;
use crate::state::AppState;
use crate::transport::read_success_json;
use crate::util::{image_extension, unix_now_secs};

const ROUTE_MESSAGE: &str = "Failed to restore image";
const COMET_SUCCESS_MESSAGE: &str = "Image restored successfully with Gemini";
const COLOR_FLAG_FIELD: &str = "color_flag";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RestoredImage {
    success: bool,
    restored_image_url: String,
    message: &'static str,
}

/// The Comet backend answers with a stored image; Phot.AI's JSON is relayed as is.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RestoreOutcome {
    Stored(RestoredImage),
    Relayed(Value),
}

/// `POST /reconstruct`: restore a damaged artifact photo.
pub async fn handler(state: Arc<AppState>, request: Request<Body>) -> Response {
    respond(reconstruct(&state, request).await, ROUTE_MESSAGE)
}

async fn reconstruct(
    state: &AppState,
    request: Request<Body>,
) -> Result<RestoreOutcome, RelayError> {
    let mut form = read_upload(request, state.config.server.max_upload_bytes).await?;
    let image = form.take_image()?;

    match state.config.restoration.backend {
        RestorationBackend::Comet => restore_with_comet(state, &image)
            .await
            .map(RestoreOutcome::Stored),
        RestorationBackend::PhotAi => {
            let color_flag = parse_color_flag(form.field(COLOR_FLAG_FIELD));
            restore_with_photai(state, &image, color_flag)
                .await
                .map(RestoreOutcome::Relayed)
        }
    }
}

async fn restore_with_comet(
    state: &AppState,
    image: &UploadedImage,
) -> Result<RestoredImage, RelayError> {
    let comet = service(
        state.config.services.comet.as_ref(),
        "Image restoration service",
    )?;
    let prompt = state
        .config
        .features
        .restoration_prompt
        .as_deref()
        .unwrap_or(RESTORATION_PROMPT);

    let request = GeminiRequest::user_turn(
        vec![
            GeminiPart::text(prompt),
            GeminiPart::inline_image(
                image.mime_type.clone(),
                base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            ),
        ],
        GeminiGenerationConfig {
            temperature: Some(comet.temperature),
            top_p: Some(comet.top_p),
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            ..GeminiGenerationConfig::default()
        },
    );
    let headers = bearer_headers(
        &comet.api_key,
        &[
            (CLIENT_ID_HEADER, comet.client_id.as_str()),
            ("accept", "application/json"),
        ],
    )?;
    let response = state
        .transport
        .post_json(&comet.endpoint, &headers, &request)
        .await?;
    let decoded: GeminiResponse = read_success_json(response).await?;

    if !decoded.has_parts() {
        return Err(RelayError::Decode("Invalid response format".to_string()));
    }
    let blob = decoded.first_image().ok_or_else(|| {
        RelayError::Decode("No image data found in response parts".to_string())
    })?;
    let restored = base64::engine::general_purpose::STANDARD
        .decode(blob.data.trim())
        .map_err(|err| RelayError::Decode(format!("Invalid base64 image data: {err}")))?;

    let stored = state
        .outputs
        .save("restored", image_extension(&blob.mime_type), &restored)
        .await?;
    tracing::info!(file = %stored.file_name, size = restored.len(), "stored restored image");
    Ok(RestoredImage {
        success: true,
        restored_image_url: stored.url,
        message: COMET_SUCCESS_MESSAGE,
    })
}

async fn restore_with_photai(
    state: &AppState,
    image: &UploadedImage,
    color_flag: bool,
) -> Result<Value, RelayError> {
    let photai = service(
        state.config.services.photai.as_ref(),
        "Image restoration service",
    )?;
    let storage = service(
        state.config.services.cloudinary.as_ref(),
        "Image hosting service",
    )?;

    // Phot.AI only accepts a public URL, so the upload is hosted first.
    let timestamp = unix_now_secs();
    let response = state
        .transport
        .post_multipart(&cloudinary::upload_url(storage), &HeaderMap::new(), || {
            cloudinary::build_upload_form(
                image.bytes.clone(),
                &image.file_name,
                &image.mime_type,
                storage,
                timestamp,
            )
        })
        .await?;
    let hosted: CloudinaryUploadResponse = read_success_json(response).await?;
    tracing::debug!(public_id = ?hosted.public_id, "hosted upload for restoration");

    let headers = api_key_headers("x-api-key", &photai.api_key)?;
    let response = state
        .transport
        .post_json(
            &photai.endpoint,
            &headers,
            &PhotAiRestoreRequest {
                source_url: &hosted.secure_url,
                color_flag,
            },
        )
        .await?;
    read_success_json(response).await
}
