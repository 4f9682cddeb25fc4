//! Splits free-text model reports into `Key: value` sections.
//!
//! Vision models answer the analysis and climate prompts with loosely
//! formatted text such as `**Name:** Bronze mirror`. The browser renders each
//! line as a card, so the relay returns the same split alongside the raw text.

use serde::Serialize;

/// Values longer than this many words get a shortened `preview`.
pub const PREVIEW_WORD_LIMIT: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Parse a model report into sections.
///
/// Markdown emphasis (`*`) is removed, blank lines are skipped and each line
/// is split at its first `:`. Lines whose value is empty (headings, prose
/// without a key) are dropped.
#[must_use]
pub fn parse_sections(text: &str) -> Vec<ReportSection> {
    let cleaned = text.replace('*', "");
    cleaned
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (key, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            Some(ReportSection {
                key: key.trim().to_string(),
                value: value.to_string(),
                preview: preview(value),
            })
        })
        .collect()
}

fn preview(value: &str) -> Option<String> {
    let mut words = value.split_whitespace();
    let head: Vec<&str> = words.by_ref().take(PREVIEW_WORD_LIMIT).collect();
    if words.next().is_none() {
        return None;
    }
    let mut out = head.join(" ");
    out.push_str("...");
    Some(out)
}
