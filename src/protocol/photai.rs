//! Phot.AI old-photo restoration request.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PhotAiRestoreRequest<'a> {
    pub source_url: &'a str,
    pub color_flag: bool,
}

/// The browser form sends the checkbox state as text; only the literal
/// `"true"` enables recoloring.
#[must_use]
pub fn parse_color_flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}
