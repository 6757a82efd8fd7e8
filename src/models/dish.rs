use serde::{Deserialize, Serialize};

/// Marker every dish summary starts with
pub const SUMMARY_MARKER: &str = "AI总结:";

/// Nutrition/recipe summary for one dish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishDetail {
    /// Dish name as requested
    pub title: String,
    /// Summary text, always starting with [`SUMMARY_MARKER`]
    #[serde(rename = "content_md")]
    pub content_markdown: String,
    /// URL of the first search result, empty when there was none
    #[serde(rename = "url")]
    pub source_url: String,
}

/// Normalize a summary so it starts at the marker
///
/// Text before an embedded marker is dropped; text without one gets the marker prefixed.
/// Returns `None` for blank input.
#[must_use]
pub fn normalize_summary(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    match text.find(SUMMARY_MARKER) {
        Some(idx) => Some(text[idx..].to_string()),
        None => Some(format!("{SUMMARY_MARKER} {text}")),
    }
}
