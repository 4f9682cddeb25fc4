use std::time::{SystemTime, UNIX_EPOCH};

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

#[inline]
pub(crate) fn unix_now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| {
            u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
        })
}

/// Extension for an image MIME type, `jpg` when unknown.
#[must_use]
pub(crate) fn image_extension(mime_type: &str) -> &'static str {
    let subtype = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .strip_prefix("image/")
        .unwrap_or_default();
    match subtype.to_ascii_lowercase().as_str() {
        "png" => "png",
        "webp" => "webp",
        "gif" => "gif",
        "bmp" => "bmp",
        "tiff" => "tiff",
        _ => "jpg",
    }
}
