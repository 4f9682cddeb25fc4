use axum::body::{self, Body};
use axum::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;

use crate::config::GeminiConfig;
use crate::error::{into_axum_response, RelayError};
use crate::protocol::gemini::{GeminiGenerationConfig, GeminiPart, GeminiRequest, GeminiResponse};
use crate::state::AppState;
use crate::transport::read_success_json;

/// Turn a handler outcome into a response, using `route_message` for failures.
pub(crate) fn respond<T>(result: Result<T, RelayError>, route_message: &str) -> Response
where
    T: serde::Serialize,
{
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => into_axum_response(&err, route_message),
    }
}

/// Look up an optional service section, failing with a 503 when it is absent.
pub(crate) fn service<'a, T>(section: Option<&'a T>, what: &str) -> Result<&'a T, RelayError> {
    section.ok_or_else(|| RelayError::NotConfigured(format!("{what} is not configured")))
}

/// Read and decode a JSON request body of at most `limit` bytes.
pub(crate) async fn read_json_body<T>(body: Body, limit: usize) -> Result<T, RelayError>
where
    T: DeserializeOwned,
{
    let bytes = body::to_bytes(body, limit).await.map_err(|err| {
        if exceeded_length_limit(&err) {
            RelayError::PayloadTooLarge { limit }
        } else {
            RelayError::InvalidRequest(format!("Invalid request body: {err}"))
        }
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| RelayError::InvalidRequest(format!("Invalid JSON body: {err}")))
}

/// `to_bytes` wraps the limit error, so look for it anywhere in the source chain.
fn exceeded_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(source) = current {
        if source.is::<LengthLimitError>() {
            return true;
        }
        current = source.source();
    }
    false
}

fn secret_header_value(value: &str) -> Result<HeaderValue, RelayError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| RelayError::Config("API key contains invalid header characters".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// `Authorization: Bearer <key>` plus any extra static headers.
pub(crate) fn bearer_headers(
    api_key: &str,
    extra: &[(&'static str, &str)],
) -> Result<HeaderMap, RelayError> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, secret_header_value(&format!("Bearer {api_key}"))?);
    for &(name, value) in extra {
        let value = HeaderValue::from_str(value)
            .map_err(|_| RelayError::Config(format!("Invalid value for header {name}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

/// A single API-key header such as `x-api-key` or `x-goog-api-key`.
pub(crate) fn api_key_headers(
    header_name: &'static str,
    api_key: &str,
) -> Result<HeaderMap, RelayError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(header_name),
        secret_header_value(api_key)?,
    );
    Ok(headers)
}

/// Run a Gemini `generateContent` call and return the text of the first candidate.
pub(crate) async fn generate_text(
    state: &AppState,
    gemini: &GeminiConfig,
    parts: Vec<GeminiPart>,
) -> Result<String, RelayError> {
    let request = GeminiRequest::user_turn(
        parts,
        GeminiGenerationConfig {
            temperature: Some(gemini.temperature),
            max_output_tokens: Some(gemini.max_output_tokens),
            ..GeminiGenerationConfig::default()
        },
    );
    let headers = api_key_headers("x-goog-api-key", &gemini.api_key)?;
    let response = state
        .transport
        .post_json(&gemini.generate_content_url(), &headers, &request)
        .await?;
    let decoded: GeminiResponse = read_success_json(response).await?;

    if let Some(reason) = decoded.block_reason() {
        return Err(RelayError::Decode(format!("Prompt was blocked: {reason}")));
    }
    decoded
        .text()
        .ok_or_else(|| RelayError::Decode("Model returned no text".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::body::{Body as HttpBody, Frame};

    #[test]
    fn test_bearer_headers_are_sensitive() {
        let headers = bearer_headers("sk-test", &[("stability-client-id", "cultural-web-app")])
            .unwrap();
        let auth = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(auth, "Bearer sk-test");
        assert!(auth.is_sensitive());
        assert_eq!(headers.get("stability-client-id").unwrap(), "cultural-web-app");
    }

    #[test]
    fn test_api_key_header_rejects_newlines() {
        assert!(matches!(
            api_key_headers("x-api-key", "bad\nkey"),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_missing_service_is_503() {
        let err = service::<GeminiConfig>(None, "Artifact analysis service").unwrap_err();
        assert_eq!(err.to_string(), "Artifact analysis service is not configured");
    }

    #[tokio::test]
    async fn test_json_body_errors() {
        let err = read_json_body::<serde_json::Value>(Body::from("{oops"), 64)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));

        let err = read_json_body::<serde_json::Value>(Body::from(vec![b' '; 128]), 64)
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::PayloadTooLarge { limit: 64 }));
    }

    struct BrokenBody;

    impl HttpBody for BrokenBody {
        type Data = bytes::Bytes;
        type Error = std::io::Error;

        fn poll_frame(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
            std::task::Poll::Ready(Some(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            ))))
        }
    }

    #[tokio::test]
    async fn test_broken_json_body_is_bad_request() {
        let err = read_json_body::<serde_json::Value>(Body::new(BrokenBody), 64)
            .await
            .unwrap_err();
        match err {
            RelayError::InvalidRequest(message) => {
                assert!(message.starts_with("Invalid request body"), "{message}");
            }
            other => panic!("expected InvalidRequest, got {other:?}"),
        }
    }
}
