use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;

/// Extra attempts after the first request.
pub(crate) const RETRY_MAX_ATTEMPTS: u32 = 2;
pub(crate) const RETRY_BACKOFF_BASE_MS: u64 = 100;
pub(crate) const RETRY_BACKOFF_MAX_MS: u64 = 1_000;
pub(crate) const RETRY_AFTER_MAX_SECS: u64 = 30;

/// 529 is Stability's "overloaded" status.
#[inline]
pub(crate) fn should_retry_upstream_status(status: http::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 503 | 529)
}

/// Connect failures are always retried: the request never reached the
/// upstream. Timeouts and reset/EOF style failures (which reqwest only
/// reports through the error text) may happen after the body was sent, so
/// they are retried only for idempotent requests.
pub(crate) fn should_retry_transport_error(err: &reqwest::Error, idempotent: bool) -> bool {
    if err.is_builder() || err.is_redirect() || err.is_decode() {
        return false;
    }
    if err.is_connect() {
        return true;
    }
    if !idempotent {
        return false;
    }
    err.is_timeout() || is_transient_transport_message(&error_chain_text(err))
}

fn error_chain_text(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

#[inline]
fn is_transient_transport_message(message: &str) -> bool {
    const NEEDLES: [&[u8]; 7] = [
        b"timed out",
        b"connection reset",
        b"connection aborted",
        b"broken pipe",
        b"connection closed before message completed",
        b"unexpected eof",
        b"incomplete message",
    ];
    let haystack = message.as_bytes();
    NEEDLES
        .iter()
        .any(|needle| contains_ascii_case_insensitive(haystack, needle))
}

#[inline]
fn contains_ascii_case_insensitive(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }

    haystack.windows(needle.len()).any(|window| {
        window
            .iter()
            .zip(needle.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

#[inline]
pub(crate) fn retry_backoff_delay(attempt: u32) -> Duration {
    let multiplier = 1_u64 << attempt.min(10);
    Duration::from_millis(
        RETRY_BACKOFF_BASE_MS
            .saturating_mul(multiplier)
            .min(RETRY_BACKOFF_MAX_MS),
    )
}

/// Delay before retrying a response: `Retry-After` when present, otherwise backoff.
#[inline]
pub(crate) fn retry_delay(headers: &http::HeaderMap, attempt: u32) -> Duration {
    parse_retry_after_delay(headers).unwrap_or_else(|| retry_backoff_delay(attempt))
}

pub(crate) fn parse_retry_after_delay(headers: &http::HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds.min(RETRY_AFTER_MAX_SECS)));
    }

    let target = httpdate::parse_http_date(raw).ok()?;
    let delay = target.duration_since(SystemTime::now()).unwrap_or_default();
    Some(delay.min(Duration::from_secs(RETRY_AFTER_MAX_SECS)))
}
