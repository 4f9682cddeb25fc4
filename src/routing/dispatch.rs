use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::header::HeaderValue;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{analyze, climate, convert, health, outputs, reconstruct};
use crate::observability::log_request_complete;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

enum RouteMatch<'a> {
    Health,
    Analyze,
    Convert,
    ConvertResult { task_id: &'a str },
    Reconstruct,
    ClimateImpact,
    Output { file_name: &'a str },
    MethodNotAllowed,
    NotFound,
}

impl RouteMatch<'_> {
    /// Low-cardinality label for logs.
    fn label(&self) -> &'static str {
        match self {
            RouteMatch::Health => "health",
            RouteMatch::Analyze => "analyze",
            RouteMatch::Convert => "convert",
            RouteMatch::ConvertResult { .. } => "convert_result",
            RouteMatch::Reconstruct => "reconstruct",
            RouteMatch::ClimateImpact => "climate_impact",
            RouteMatch::Output { .. } => "outputs",
            RouteMatch::MethodNotAllowed => "method_not_allowed",
            RouteMatch::NotFound => "not_found",
        }
    }
}

/// Dispatch a raw HTTP request to the matching relay handler.
///
/// Every response carries an `x-request-id` header and is logged on completion.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let start = Instant::now();
    let request_id = state.request_uuid(state.next_request_seq());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let route = match_route(&method, &path, base_path.as_ref());
    let label = route.label();

    let mut response = match route {
        RouteMatch::Health => health::health_handler(&state).into_response(),
        RouteMatch::Analyze => analyze::handler(state, request).await,
        RouteMatch::Convert => convert::handler(state, request).await,
        RouteMatch::ConvertResult { task_id } => convert::result_handler(state, task_id).await,
        RouteMatch::Reconstruct => reconstruct::handler(state, request).await,
        RouteMatch::ClimateImpact => climate::handler(state, request.into_body()).await,
        RouteMatch::Output { file_name } => outputs::handler(state, file_name, request).await,
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    log_request_complete(&request_id, &method, label, response.status(), start);
    Ok(response)
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

fn only<'a>(method: &Method, expected: &Method, route: RouteMatch<'a>) -> RouteMatch<'a> {
    if method == expected {
        route
    } else {
        RouteMatch::MethodNotAllowed
    }
}

fn match_route<'a>(method: &Method, path: &'a str, base_path: &str) -> RouteMatch<'a> {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    match path {
        "/" | "/health" => only(method, &Method::GET, RouteMatch::Health),
        "/analyze" => only(method, &Method::POST, RouteMatch::Analyze),
        "/api/convert" => only(method, &Method::POST, RouteMatch::Convert),
        "/reconstruct" => only(method, &Method::POST, RouteMatch::Reconstruct),
        "/climate-impact" => only(method, &Method::POST, RouteMatch::ClimateImpact),
        _ => {
            if let Some(task_id) = path.strip_prefix("/api/result/") {
                if task_id.is_empty() || task_id.contains('/') {
                    RouteMatch::NotFound
                } else {
                    only(method, &Method::GET, RouteMatch::ConvertResult { task_id })
                }
            } else if let Some(file_name) = path.strip_prefix("/outputs/") {
                if file_name.is_empty() || file_name.contains('/') {
                    RouteMatch::NotFound
                } else if method == Method::GET || method == Method::HEAD {
                    RouteMatch::Output { file_name }
                } else {
                    RouteMatch::MethodNotAllowed
                }
            } else {
                RouteMatch::NotFound
            }
        }
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(method: Method, path: &str, base_path: &str) -> &'static str {
        match_route(&method, path, base_path).label()
    }

    #[test]
    fn test_known_routes() {
        assert_eq!(label(Method::GET, "/", ""), "health");
        assert_eq!(label(Method::GET, "/health", ""), "health");
        assert_eq!(label(Method::POST, "/analyze", ""), "analyze");
        assert_eq!(label(Method::POST, "/api/convert", ""), "convert");
        assert_eq!(label(Method::GET, "/api/result/abc-123", ""), "convert_result");
        assert_eq!(label(Method::POST, "/reconstruct", ""), "reconstruct");
        assert_eq!(label(Method::POST, "/climate-impact", ""), "climate_impact");
        assert_eq!(label(Method::GET, "/outputs/stable_1-1.glb", ""), "outputs");
        assert_eq!(label(Method::HEAD, "/outputs/stable_1-1.glb", ""), "outputs");
    }

    #[test]
    fn test_wrong_method() {
        assert_eq!(label(Method::GET, "/analyze", ""), "method_not_allowed");
        assert_eq!(label(Method::POST, "/health", ""), "method_not_allowed");
        assert_eq!(label(Method::POST, "/outputs/a.glb", ""), "method_not_allowed");
        assert_eq!(label(Method::DELETE, "/api/result/abc", ""), "method_not_allowed");
    }

    #[test]
    fn test_unknown_paths() {
        assert_eq!(label(Method::GET, "/nope", ""), "not_found");
        assert_eq!(label(Method::GET, "/api/result/", ""), "not_found");
        assert_eq!(label(Method::GET, "/api/result/a/b", ""), "not_found");
        assert_eq!(label(Method::GET, "/outputs/", ""), "not_found");
        assert_eq!(label(Method::GET, "/outputs/x/../y", ""), "not_found");
    }

    #[test]
    fn test_base_path() {
        assert_eq!(label(Method::GET, "/relay", "/relay"), "health");
        assert_eq!(label(Method::POST, "/relay/analyze", "/relay"), "analyze");
        assert_eq!(label(Method::POST, "/analyze", "/relay"), "not_found");
        assert_eq!(label(Method::POST, "/relayanalyze", "/relay"), "not_found");
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path(""), "");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path("relay/"), "/relay");
        assert_eq!(normalize_base_path(" /relay/ "), "/relay");
    }
}
