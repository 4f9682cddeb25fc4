use crate::protocol::error_shapes::relay_error_payload;

/// Error type shared by every relay route.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotConfigured(String),
    #[error("Request body too large (max {limit} bytes)")]
    PayloadTooLarge { limit: usize },
    #[error("{0}")]
    NotFound(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Upstream response decode error: {0}")]
    Decode(String),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    NotFound,
    PayloadTooLarge,
    RateLimit,
    BadGateway,
    Unavailable,
    ServerError,
}

/// Map an upstream HTTP status code to an error category.
///
/// Upstream auth failures are our credentials, not the client's, so they are
/// surfaced as a gateway failure rather than a 401.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        429 => ErrorCategory::RateLimit,
        _ => ErrorCategory::BadGateway,
    }
}

impl RelayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            RelayError::NotFound(_) => ErrorCategory::NotFound,
            RelayError::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            RelayError::NotConfigured(_) => ErrorCategory::Unavailable,
            RelayError::Upstream { status, .. } => category_from_upstream_status(*status),
            RelayError::Transport(_) | RelayError::Decode(_) => ErrorCategory::BadGateway,
            RelayError::Config(_) | RelayError::Storage(_) | RelayError::Internal(_) => {
                ErrorCategory::ServerError
            }
        }
    }

    /// Whether the message is safe and useful to show to the client verbatim.
    #[must_use]
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::InvalidRequest
                | ErrorCategory::NotFound
                | ErrorCategory::PayloadTooLarge
                | ErrorCategory::Unavailable
        )
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

#[must_use]
pub fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::PayloadTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::RateLimit => http::StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::Unavailable => http::StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Format an error for a relay route
// ---------------------------------------------------------------------------

/// Format an error for a route, returning (`status_code`, JSON body).
///
/// `route_message` is the route's generic failure text. It is used as the
/// `error` field for server-side failures, with the underlying cause moved
/// into `details`.
#[must_use]
pub fn format_error(
    err: &RelayError,
    route_message: &str,
) -> (http::StatusCode, serde_json::Value) {
    let status = http_status_for_category(err.category());
    let cause = err.to_string();

    let body = if err.is_client_facing() {
        relay_error_payload(&cause, None)
    } else {
        relay_error_payload(route_message, Some(&cause))
    };

    (status, body)
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

/// Convert a `RelayError` into an axum response for a specific route.
#[must_use]
pub fn into_axum_response(err: &RelayError, route_message: &str) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err, route_message);
    if status.is_server_error() {
        tracing::warn!(status = status.as_u16(), error = %err, "{route_message}");
    } else {
        tracing::debug!(status = status.as_u16(), error = %err, "rejected request");
    }
    (status, axum::Json(body)).into_response()
}

/// Default `IntoResponse` implementation uses a generic route message.
/// Route handlers should call [`into_axum_response`] with their own message instead.
impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self, "Request failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_is_client_facing() {
        let err = RelayError::InvalidRequest("No image file uploaded".to_string());
        let (status, body) = format_error(&err, "Error analyzing the image");
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "No image file uploaded");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_upstream_error_uses_route_message() {
        let err = RelayError::Upstream {
            status: 500,
            message: "model overloaded".to_string(),
        };
        let (status, body) = format_error(&err, "Error analyzing the image");
        assert_eq!(status, http::StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Error analyzing the image");
        assert!(body["details"]
            .as_str()
            .is_some_and(|details| details.contains("model overloaded")));
    }

    #[test]
    fn test_upstream_auth_failure_is_not_client_auth() {
        assert_eq!(
            category_from_upstream_status(401),
            ErrorCategory::BadGateway
        );
        assert_eq!(
            category_from_upstream_status(429),
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_not_configured_maps_to_503() {
        let err = RelayError::NotConfigured("3D conversion service is not configured".into());
        let (status, body) = format_error(&err, "Failed to convert to 3D model");
        assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "3D conversion service is not configured");
    }

    #[test]
    fn test_storage_error_is_server_error() {
        let err = RelayError::from(std::io::Error::other("disk full"));
        assert_eq!(err.category(), ErrorCategory::ServerError);
        assert!(!err.is_client_facing());
    }
}
