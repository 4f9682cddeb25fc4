//! Stability AI `stable-fast-3d` request encoding.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use crate::config::StabilityConfig;
use crate::error::RelayError;

/// Header Stability uses to attribute traffic to a client application.
pub const CLIENT_ID_HEADER: &str = "stability-client-id";

/// Build the multipart form for one conversion attempt.
///
/// Forms are consumed by `reqwest`, so retries call this again; the image
/// bytes are reference counted and never copied.
///
/// # Errors
///
/// Returns [`RelayError::Internal`] when the MIME type cannot be attached.
pub fn build_form(
    image: Bytes,
    file_name: &str,
    mime_type: &str,
    config: &StabilityConfig,
) -> Result<Form, RelayError> {
    let length = image.len() as u64;
    let image_part = Part::stream_with_length(image, length)
        .file_name(file_name.to_string())
        .mime_str(mime_type)
        .map_err(|err| RelayError::Internal(format!("invalid image MIME type: {err}")))?;

    Ok(Form::new()
        .part("image", image_part)
        .text("texture_resolution", config.texture_resolution.to_string())
        .text("foreground_ratio", config.foreground_ratio.to_string())
        .text("remesh", config.remesh.clone()))
}

/// Whether a successful Stability response looks like a binary glTF model.
#[must_use]
pub fn is_glb(body: &[u8]) -> bool {
    body.starts_with(b"glTF")
}
