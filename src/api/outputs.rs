use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::RelayError;
use crate::state::AppState;

/// `GET|HEAD /outputs/{file}`: serve a generated model or restored image.
pub async fn handler(state: Arc<AppState>, file_name: &str, request: Request<Body>) -> Response {
    let Some(path) = state.outputs.resolve(file_name) else {
        return RelayError::NotFound("Output not found".to_string()).into_response();
    };

    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
