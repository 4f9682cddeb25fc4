use serde::{Deserialize, Serialize};

/// Gemini v1beta `generateContent` request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

impl GeminiRequest {
    /// A single user turn made of the given parts.
    #[must_use]
    pub fn user_turn(parts: Vec<GeminiPart>, generation_config: GeminiGenerationConfig) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: Some(generation_config),
        }
    }
}

/// A content message in Gemini format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// A single part within a Gemini content message.
///
/// Modeled as a struct rather than an enum so unknown part kinds
/// (`executableCode`, ...) in responses are skipped instead of failing the
/// whole decode. Thinking models mark reasoning parts with `thought: true`;
/// those are never part of the answer text. Image models proxied by third
/// parties answer with either `inlineData` or `inline_data`, so both
/// spellings are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl GeminiPart {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
            thought: None,
        }
    }

    #[must_use]
    pub fn inline_image(mime_type: impl Into<String>, base64_data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(GeminiBlob {
                mime_type: mime_type.into(),
                data: base64_data,
            }),
            thought: None,
        }
    }

    fn is_thought(&self) -> bool {
        self.thought == Some(true)
    }
}

/// Base64 payload with its MIME type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiBlob {
    #[serde(default, alias = "mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

/// Generation config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_modalities: Option<Vec<String>>,
}

/// Gemini `generateContent` response wire type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Option<Vec<GeminiCandidate>>,
    #[serde(default)]
    pub prompt_feedback: Option<GeminiPromptFeedback>,
}

/// A candidate in the response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Why a prompt was rejected before generation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GeminiResponse {
    fn first_candidate_parts(&self) -> Option<&[GeminiPart]> {
        let content = self.candidates.as_ref()?.first()?.content.as_ref()?;
        if content.parts.is_empty() {
            None
        } else {
            Some(&content.parts)
        }
    }

    /// Whether the first candidate carries any parts at all.
    #[must_use]
    pub fn has_parts(&self) -> bool {
        self.first_candidate_parts().is_some()
    }

    /// Concatenated answer text of the first candidate, or `None` when it has
    /// no text. Reasoning parts are left out.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let parts = self.first_candidate_parts()?;
        let text: String = parts
            .iter()
            .filter(|part| !part.is_thought())
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// First inline payload in the first candidate whose MIME type is an image.
    #[must_use]
    pub fn first_image(&self) -> Option<&GeminiBlob> {
        self.first_candidate_parts()?
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .find(|blob| blob.mime_type.starts_with("image/") && !blob.data.is_empty())
    }

    #[must_use]
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}
