use serde::{Deserialize, Serialize};

/// A crawled article converted to Markdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable id derived from the URL, e.g. `csdn_123456`
    pub doc_id: String,
    /// Source site tag
    pub source: String,
    pub url: String,
    pub title: String,
    #[serde(rename = "content_md")]
    pub content_markdown: String,
}
