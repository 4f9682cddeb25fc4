//! Wire shapes for error bodies returned to the browser client and for
//! error bodies read back from upstream services.

const UPSTREAM_MESSAGE_MAX_LEN: usize = 500;

#[must_use]
pub(crate) fn relay_error_payload(error: &str, details: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "success": false,
        "error": error,
    });
    if let Some(details) = details {
        body["details"] = serde_json::Value::String(details.to_string());
    }
    body
}

/// Reduce an upstream error body to a short human-readable message.
///
/// Prefers `error.message` (Gemini/Comet), then `message`/`errors[0]`
/// (Stability, Meshy, Phot.AI), and falls back to the raw text.
#[must_use]
pub fn sanitize_upstream_error(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .or_else(|| json.get("error").and_then(|e| e.as_str()))
            .or_else(|| json.get("message").and_then(|m| m.as_str()))
            .or_else(|| {
                json.get("errors")
                    .and_then(|e| e.get(0))
                    .and_then(|m| m.as_str())
            });
        if let Some(message) = message {
            return truncate_message(message);
        }
    }

    truncate_message(&String::from_utf8_lossy(body))
}

fn truncate_message(message: &str) -> String {
    if message.len() <= UPSTREAM_MESSAGE_MAX_LEN {
        return message.to_string();
    }
    let mut end = UPSTREAM_MESSAGE_MAX_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}
