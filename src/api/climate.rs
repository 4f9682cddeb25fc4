use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use super::common::{generate_text, read_json_body, respond, service};
use super::prompts::climate_prompt;
use crate::error::RelayError;
use crate::protocol::gemini::GeminiPart;
use crate::report::{parse_sections, ReportSection};
use crate::state::AppState;

const ROUTE_MESSAGE: &str = "Failed to fetch climate impact analysis.";
/// Text-only request bodies never need the full upload allowance.
const CLIMATE_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClimateRequest {
    #[serde(default)]
    artifact_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct ClimateResponse {
    analysis: String,
    sections: Vec<ReportSection>,
}

/// `POST /climate-impact`: climate risk report for a named artifact.
pub async fn handler(state: Arc<AppState>, body: Body) -> Response {
    respond(climate_impact(&state, body).await, ROUTE_MESSAGE)
}

async fn climate_impact(state: &AppState, body: Body) -> Result<ClimateResponse, RelayError> {
    let request: ClimateRequest = read_json_body(body, CLIMATE_BODY_LIMIT).await?;
    let artifact_name = request
        .artifact_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RelayError::InvalidRequest("Artifact name is required".to_string()))?;
    let gemini = service(
        state.config.services.gemini.as_ref(),
        "Climate analysis service",
    )?;

    let prompt = climate_prompt(
        state.config.features.climate_prompt_template.as_deref(),
        artifact_name,
    );
    let analysis = generate_text(state, gemini, vec![GeminiPart::text(prompt)]).await?;
    let sections = parse_sections(&analysis);
    Ok(ClimateResponse { analysis, sections })
}
