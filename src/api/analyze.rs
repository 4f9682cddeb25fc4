use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use base64::Engine as _;
use serde::Serialize;

use super::common::{generate_text, read_upload, respond, service};
use super::prompts::ANALYSIS_PROMPT;
use crate::error::RelayError;
use crate::protocol::gemini::GeminiPart;
use crate::report::{parse_sections, ReportSection};
use crate::state::AppState;

const ROUTE_MESSAGE: &str = "Error analyzing the image";

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    result: String,
    sections: Vec<ReportSection>,
}

/// `POST /analyze`: identify the uploaded artifact with the vision model.
pub async fn handler(state: Arc<AppState>, request: Request<Body>) -> Response {
    respond(analyze(&state, request).await, ROUTE_MESSAGE)
}

async fn analyze(state: &AppState, request: Request<Body>) -> Result<AnalyzeResponse, RelayError> {
    let mut form = read_upload(request, state.config.server.max_upload_bytes).await?;
    let image = form.take_image()?;
    let gemini = service(
        state.config.services.gemini.as_ref(),
        "Artifact analysis service",
    )?;

    let prompt = state
        .config
        .features
        .analysis_prompt
        .as_deref()
        .unwrap_or(ANALYSIS_PROMPT);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
    let parts = vec![
        GeminiPart::text(prompt),
        GeminiPart::inline_image(image.mime_type, encoded),
    ];

    let result = generate_text(state, gemini, parts).await?;
    let sections = parse_sections(&result);
    tracing::debug!(sections = sections.len(), "artifact analysis complete");
    Ok(AnalyzeResponse { result, sections })
}
