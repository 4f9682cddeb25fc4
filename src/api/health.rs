use std::sync::Arc;

use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Reports which collaborators are configured, never their credentials.
pub fn health_handler(state: &Arc<AppState>) -> Json<Value> {
    let config = &state.config;
    let services = &config.services;
    Json(json!({
        "status": "ok",
        "services": {
            "gemini": services.gemini.is_some(),
            "stability": services.stability.is_some(),
            "meshy": services.meshy.is_some(),
            "comet": services.comet.is_some(),
            "photai": services.photai.is_some(),
            "cloudinary": services.cloudinary.is_some(),
        },
        "restoration_backend": config.restoration.backend.to_string(),
        "max_upload_bytes": config.server.max_upload_bytes,
    }))
}
