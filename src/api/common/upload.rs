use std::collections::HashMap;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart};
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use tower::{Layer, ServiceExt};

use crate::error::RelayError;

/// Form field the browser puts the photo in.
pub(crate) const IMAGE_FIELD: &str = "image";
const FALLBACK_MIME_TYPE: &str = "image/jpeg";
const FALLBACK_FILE_NAME: &str = "upload";

/// The uploaded photo, held in memory for the lifetime of one request.
#[derive(Debug, Clone)]
pub(crate) struct UploadedImage {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
}

#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    image: Option<UploadedImage>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// The `image` part, or the client error the browser expects when it is missing.
    pub(crate) fn take_image(&mut self) -> Result<UploadedImage, RelayError> {
        let image = self
            .image
            .take()
            .ok_or_else(|| RelayError::InvalidRequest("No image file uploaded".to_string()))?;
        if image.bytes.is_empty() {
            return Err(RelayError::InvalidRequest(
                "Uploaded image file is empty".to_string(),
            ));
        }
        Ok(image)
    }

    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Read a `multipart/form-data` request, capping the body at `limit` bytes.
///
/// The first file part named `image` is kept; other file parts are skipped
/// and text parts are collected by name.
pub(crate) async fn read_upload(
    request: Request<Body>,
    limit: usize,
) -> Result<UploadForm, RelayError> {
    let extract = tower::service_fn(|request: Request<Body>| async move {
        Multipart::from_request(request, &()).await
    });
    let mut multipart = DefaultBodyLimit::max(limit)
        .layer(extract)
        .oneshot(request)
        .await
        .map_err(|rejection| {
            tracing::debug!(error = %rejection, "request is not a multipart upload");
            RelayError::InvalidRequest("No image file uploaded".to_string())
        })?;

    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(&err, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(base_file_name);
        let declared_mime = field.content_type().map(str::to_string);

        if let Some(file_name) = file_name {
            if name != IMAGE_FIELD || form.image.is_some() {
                continue;
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|err| multipart_error(&err, limit))?;
            let mime_type = resolve_mime_type(declared_mime.as_deref(), &bytes).to_string();
            tracing::debug!(size = bytes.len(), mime_type = %mime_type, "received image upload");
            form.image = Some(UploadedImage {
                bytes,
                file_name,
                mime_type,
            });
        } else {
            let text = field
                .text()
                .await
                .map_err(|err| multipart_error(&err, limit))?;
            form.fields.insert(name, text);
        }
    }

    Ok(form)
}

fn multipart_error(err: &MultipartError, limit: usize) -> RelayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { limit }
    } else {
        RelayError::InvalidRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Strip any client-side directory from an uploaded file name.
fn base_file_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if name.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Declared `image/*` type when the browser sent one, else sniffed, else JPEG.
pub(crate) fn resolve_mime_type<'a>(declared: Option<&'a str>, bytes: &[u8]) -> &'a str {
    if let Some(declared) = declared {
        let essence = declared.split(';').next().unwrap_or_default().trim();
        if essence.len() > "image/".len() && essence.starts_with("image/") {
            return essence;
        }
    }
    sniff_image_mime(bytes).unwrap_or(FALLBACK_MIME_TYPE)
}

/// Detect an image type from its magic bytes.
pub(crate) fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        _ => None,
    }
}
