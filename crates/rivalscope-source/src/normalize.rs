//! Normalization of heterogeneous provider payloads.
//!
//! Providers disagree on field names and envelope shapes. Each logical field
//! is resolved through a fixed priority list rather than runtime probing, so
//! the mapping is explicit and testable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::types::Article;

/// Flatten a search response into its article objects.
///
/// Tolerated envelopes, in order: a bare JSON array, `{"articles": [...]}`,
/// a single article object. Anything else yields no articles.
#[must_use]
pub fn normalize_search_response(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("articles") {
            Some(Value::Array(items)) => items.clone(),
            _ => vec![body.clone()],
        },
        _ => Vec::new(),
    }
}

/// Normalize one raw article object into an [`Article`].
///
/// `fallback_title` (the company name being searched) stands in when the
/// payload carries no usable title, matching the upstream contract that a
/// mention always has a title.
#[must_use]
pub fn normalize_article(raw: &Value, fallback_title: &str) -> Article {
    let title = first_string(raw, &["title", "headline"])
        .unwrap_or_else(|| fallback_title.to_string());
    let url = first_string(raw, &["url", "link"]);
    let source = first_string(raw, &["source"]);
    let published_at =
        first_string(raw, &["published_date", "date", "publishedAt"]).and_then(|s| {
            parse_published_at(&s)
        });
    let content = first_string(raw, &["content", "description", "summary"]);
    let sentiment_score = first_number(raw, &["sentiment_score"]);

    Article {
        title,
        url,
        source,
        published_at,
        content,
        sentiment_score,
    }
}

/// Parse a provider date string into UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, and bare `YYYY-MM-DD`.
/// Anything else is discarded to `None` — an unparsable date is never fatal.
#[must_use]
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        raw.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
    })
}

fn first_number(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| {
        let value = raw.get(key)?;
        match value {
            Value::Number(n) => n.as_f64(),
            // Some providers send numeric fields as strings.
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_article_prefers_canonical_fields() {
        let raw = json!({
            "title": "Acme raises series B",
            "headline": "ignored",
            "url": "https://example.com/acme",
            "source": "newswire",
            "published_date": "2025-06-01T12:00:00Z",
            "content": "Acme announced...",
            "sentiment_score": 0.7
        });
        let article = normalize_article(&raw, "Acme");
        assert_eq!(article.title, "Acme raises series B");
        assert_eq!(article.url.as_deref(), Some("https://example.com/acme"));
        assert_eq!(article.source.as_deref(), Some("newswire"));
        assert!(article.published_at.is_some());
        assert_eq!(article.content.as_deref(), Some("Acme announced..."));
        assert_eq!(article.sentiment_score, Some(0.7));
    }

    #[test]
    fn normalize_article_falls_through_priority_lists() {
        let raw = json!({
            "headline": "Bolt ships new feature",
            "link": "https://example.com/bolt",
            "publishedAt": "2025-06-02",
            "summary": "Bolt shipped...",
        });
        let article = normalize_article(&raw, "Bolt");
        assert_eq!(article.title, "Bolt ships new feature");
        assert_eq!(article.url.as_deref(), Some("https://example.com/bolt"));
        assert!(article.published_at.is_some());
        assert_eq!(article.content.as_deref(), Some("Bolt shipped..."));
        assert!(article.sentiment_score.is_none());
    }

    #[test]
    fn normalize_article_defaults_title_to_company_name() {
        let article = normalize_article(&json!({"url": "https://x.test"}), "Acme");
        assert_eq!(article.title, "Acme");
    }

    #[test]
    fn sentiment_accepts_numeric_strings() {
        let article = normalize_article(&json!({"sentiment_score": "-0.25"}), "Acme");
        assert_eq!(article.sentiment_score, Some(-0.25));
    }

    #[test]
    fn unparsable_date_is_discarded_not_fatal() {
        let article = normalize_article(
            &json!({"title": "t", "published_date": "next Tuesday"}),
            "Acme",
        );
        assert!(article.published_at.is_none());
    }

    #[test]
    fn parse_published_at_accepts_common_formats() {
        assert!(parse_published_at("2025-06-01T12:00:00Z").is_some());
        assert!(parse_published_at("2025-06-01T12:00:00+02:00").is_some());
        assert!(parse_published_at("2025-06-01 12:00:00").is_some());
        assert!(parse_published_at("2025-06-01").is_some());
        assert!(parse_published_at("").is_none());
        assert!(parse_published_at("garbage").is_none());
    }

    #[test]
    fn search_response_envelopes_are_tolerated() {
        let bare = json!([{"title": "a"}, {"title": "b"}]);
        assert_eq!(normalize_search_response(&bare).len(), 2);

        let wrapped = json!({"articles": [{"title": "a"}]});
        assert_eq!(normalize_search_response(&wrapped).len(), 1);

        let single = json!({"title": "a"});
        assert_eq!(normalize_search_response(&single).len(), 1);

        assert!(normalize_search_response(&json!("nope")).is_empty());
    }
}
