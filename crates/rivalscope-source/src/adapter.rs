//! The source adapter trait and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::error::SourceError;
use crate::normalize::{normalize_article, normalize_search_response};
use crate::types::{Article, PageContent};

/// The fixed page types fetched per competitor website, in fetch order.
pub const PAGE_TYPES: [&str; 4] = ["homepage", "pricing", "about", "features"];

/// External signal source the orchestrator depends on.
///
/// Both operations are infallible by contract: implementations contain
/// provider failures and return degraded results instead of errors.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Search news articles mentioning `company_name` within the last
    /// `days_back` days. Returns an empty list on any provider failure.
    async fn search_news(&self, company_name: &str, days_back: i64) -> Vec<Article>;

    /// Fetch and extract one web page. On failure the returned record has
    /// empty content and an error marker; the call itself never fails.
    async fn fetch_page(&self, url: &str) -> PageContent;
}

/// Configuration for [`HttpSourceAdapter`].
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

/// Adapter backed by a JSON news/content API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSourceAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSourceAdapter {
    /// Build the adapter with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the client cannot be constructed.
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn try_search_news(
        &self,
        company_name: &str,
        days_back: i64,
    ) -> Result<Vec<Article>, SourceError> {
        let since = (Utc::now() - ChronoDuration::days(days_back.max(0)))
            .format("%Y-%m-%d")
            .to_string();
        let query = utf8_percent_encode(company_name, NON_ALPHANUMERIC).to_string();
        let url = format!(
            "{}/v1/news/search?q={query}&from_date={since}",
            self.base_url
        );

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let body: serde_json::Value = response.json().await?;
        let articles = normalize_search_response(&body)
            .iter()
            .map(|raw| normalize_article(raw, company_name))
            .collect();

        Ok(articles)
    }

    async fn try_fetch_page(&self, page_url: &str) -> Result<PageContent, SourceError> {
        let encoded = utf8_percent_encode(page_url, NON_ALPHANUMERIC).to_string();
        let url = format!("{}/v1/content/extract?url={encoded}", self.base_url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let content: serde_json::Value = response.json().await?;
        Ok(PageContent {
            url: page_url.to_string(),
            content,
            error: None,
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpSourceAdapter {
    async fn search_news(&self, company_name: &str, days_back: i64) -> Vec<Article> {
        match self.try_search_news(company_name, days_back).await {
            Ok(articles) => {
                tracing::debug!(
                    company = company_name,
                    count = articles.len(),
                    "news search returned articles"
                );
                articles
            }
            Err(e) => {
                tracing::warn!(
                    company = company_name,
                    error = %e,
                    "news search failed; returning no articles"
                );
                Vec::new()
            }
        }
    }

    async fn fetch_page(&self, url: &str) -> PageContent {
        match self.try_fetch_page(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url, error = %e, "page fetch failed; returning empty content");
                PageContent::empty_with_error(url, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> HttpSourceAdapter {
        HttpSourceAdapter::new(&SourceConfig {
            base_url: server.uri(),
            api_key: None,
            request_timeout_secs: 5,
            user_agent: "rivalscope-tests/0.1".to_string(),
        })
        .expect("build adapter")
    }

    #[tokio::test]
    async fn search_news_normalizes_wrapped_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/news/search"))
            .and(query_param("q", "Acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "articles": [
                    {"headline": "Acme expands", "link": "https://example.com/1",
                     "publishedAt": "2025-06-01", "sentiment_score": "0.5"},
                ]
            })))
            .mount(&server)
            .await;

        let articles = adapter_for(&server).search_news("Acme", 7).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Acme expands");
        assert_eq!(articles[0].sentiment_score, Some(0.5));
        assert!(articles[0].published_at.is_some());
    }

    #[tokio::test]
    async fn search_news_returns_empty_on_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/news/search"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let articles = adapter_for(&server).search_news("Acme", 7).await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn fetch_page_returns_error_marker_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/content/extract"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let page = adapter_for(&server)
            .fetch_page("https://acme.example.com/pricing")
            .await;
        assert_eq!(page.url, "https://acme.example.com/pricing");
        assert_eq!(page.content, serde_json::json!({}));
        assert!(page.error.is_some());
    }

    #[tokio::test]
    async fn fetch_page_passes_payload_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/content/extract"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Pricing starts at $10",
                "url": "https://acme.example.com/pricing"
            })))
            .mount(&server)
            .await;

        let page = adapter_for(&server)
            .fetch_page("https://acme.example.com/pricing")
            .await;
        assert!(page.error.is_none());
        assert_eq!(page.content["text"], "Pricing starts at $10");
    }
}
