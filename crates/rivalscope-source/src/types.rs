use chrono::{DateTime, Utc};

/// One news article normalized from whatever shape the provider returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    pub url: Option<String>,
    pub source: Option<String>,
    /// Publication timestamp; unparsable provider dates are discarded to
    /// `None`, never treated as fatal.
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
    /// Provider-scored sentiment in [-1.0, 1.0], when present.
    pub sentiment_score: Option<f64>,
}

/// One fetched web page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    pub url: String,
    /// Opaque structured payload. Empty object when the fetch failed.
    pub content: serde_json::Value,
    /// Set when the fetch failed; the record is still returned.
    pub error: Option<String>,
}

impl PageContent {
    #[must_use]
    pub fn empty_with_error(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            content: serde_json::json!({}),
            error: Some(error.into()),
        }
    }
}
