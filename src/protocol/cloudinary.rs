//! Cloudinary signed image upload.
//!
//! Cloudinary signs the alphabetically sorted `key=value` parameters joined
//! with `&`, followed by the API secret. `file`, `api_key` and the signature
//! fields themselves are excluded from the string to sign.

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::CloudinaryConfig;
use crate::error::RelayError;

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryUploadResponse {
    pub secure_url: String,
    #[serde(default)]
    pub public_id: Option<String>,
}

#[must_use]
pub fn upload_url(config: &CloudinaryConfig) -> String {
    format!(
        "{}/{}/image/upload",
        config.base_url.trim_end_matches('/'),
        config.cloud_name
    )
}

/// SHA-256 request signature over `folder` and `timestamp`.
#[must_use]
pub fn sign_upload(folder: &str, timestamp: u64, api_secret: &str) -> String {
    let to_sign = format!("folder={folder}&timestamp={timestamp}{api_secret}");
    hex::encode(Sha256::digest(to_sign.as_bytes()))
}

/// Build the signed multipart upload form.
///
/// # Errors
///
/// Returns [`RelayError::Internal`] when the MIME type cannot be attached.
pub fn build_upload_form(
    image: Bytes,
    file_name: &str,
    mime_type: &str,
    config: &CloudinaryConfig,
    timestamp: u64,
) -> Result<Form, RelayError> {
    let length = image.len() as u64;
    let file_part = Part::stream_with_length(image, length)
        .file_name(file_name.to_string())
        .mime_str(mime_type)
        .map_err(|err| RelayError::Internal(format!("invalid image MIME type: {err}")))?;
    let signature = sign_upload(&config.folder, timestamp, &config.api_secret);

    Ok(Form::new()
        .part("file", file_part)
        .text("api_key", config.api_key.clone())
        .text("folder", config.folder.clone())
        .text("timestamp", timestamp.to_string())
        .text("signature_algorithm", "sha256")
        .text("signature", signature))
}
