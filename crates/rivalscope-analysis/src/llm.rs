//! Chat-completion clients for insight synthesis.
//!
//! The orchestrator only sees the [`InsightModel`] trait; the two concrete
//! clients cover the supported providers. Both return the raw text of the
//! first completion and leave parsing to the synthesizer.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_MODEL: &str = "gpt-4o";

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const MAX_TOKENS: u32 = 4096;

/// A chat model that turns a system prompt plus a user prompt into text.
#[async_trait]
pub trait InsightModel: Send + Sync {
    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// response body with no completion text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI chat-completions client.
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiModel {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: OPENAI_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint. Used in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl InsightModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .context("OpenAI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI returned {status}: {body}"));
        }

        let body: serde_json::Value =
            response.json().await.context("invalid OpenAI response body")?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("OpenAI response carried no completion text"))
    }
}

/// Anthropic messages client.
pub struct AnthropicModel {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicModel {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: ANTHROPIC_MODEL.to_string(),
        }
    }

    /// Point the client at a different endpoint. Used in tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl InsightModel for AnthropicModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": MAX_TOKENS,
                "system": system,
                "messages": [
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .context("Anthropic request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Anthropic returned {status}: {body}"));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("invalid Anthropic response body")?;
        body["content"][0]["text"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| anyhow!("Anthropic response carried no completion text"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn openai_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "gpt-4o"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"insights\": []}"}}]
            })))
            .mount(&server)
            .await;

        let model = OpenAiModel::new("test-key").with_base_url(server.uri());
        let text = model.complete("system", "user").await.expect("completion");
        assert_eq!(text, "{\"insights\": []}");
    }

    #[tokio::test]
    async fn openai_errors_on_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let model = OpenAiModel::new("test-key").with_base_url(server.uri());
        let err = model.complete("system", "user").await.expect_err("error");
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn anthropic_extracts_first_content_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "hello"}]
            })))
            .mount(&server)
            .await;

        let model = AnthropicModel::new("test-key").with_base_url(server.uri());
        let text = model.complete("system", "user").await.expect("completion");
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn anthropic_errors_on_missing_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": []})))
            .mount(&server)
            .await;

        let model = AnthropicModel::new("test-key").with_base_url(server.uri());
        assert!(model.complete("system", "user").await.is_err());
    }
}
