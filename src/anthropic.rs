use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use crate::llm::LanguageModel;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "anthropic";

#[derive(Debug, Serialize, Clone)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

pub struct AnthropicClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: &str, config: &InsightsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.endpoint(ANTHROPIC_API_BASE, MESSAGES_PATH),
            api_key: api_key.to_string(),
            model: config.model_name().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// Send a messages request and return the final text block
    pub async fn chat_completion(
        &self,
        messages: Vec<AnthropicMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: max_tokens.unwrap_or(self.max_tokens),
            messages,
            temperature: Some(temperature),
        };

        let response = self.client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(InsightsError::provider(PROVIDER, "Invalid Anthropic API key"));
            } else if status.as_u16() == 429 {
                return Err(InsightsError::provider(PROVIDER, "Rate limited - too many requests"));
            }

            return Err(InsightsError::provider(PROVIDER, describe_error(status.as_u16(), &error_text)));
        }

        let completion: MessagesResponse = response.json().await?;
        last_text_block(completion)
            .ok_or_else(|| InsightsError::provider(PROVIDER, "No text response from Claude"))
    }
}

/// Prefer the structured error body when the API sends one
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<AnthropicError>(body) {
        Ok(parsed) => format!("API error ({}): {} - {}", status, parsed.error.error_type, parsed.error.message),
        Err(_) => format!("API error ({}): {}", status, body),
    }
}

fn last_text_block(response: MessagesResponse) -> Option<String> {
    response.content
        .into_iter()
        .filter(|c| c.content_type == "text")
        .last()
        .and_then(|c| c.text)
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![AnthropicMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat_completion(messages, self.temperature, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::error::AnalysisError;
    use crate::llm::test_server;

    async fn client_for(base_url: String) -> AnthropicClient {
        let config = test_server::config_for(ProviderKind::Anthropic, &base_url);
        AnthropicClient::new("test-key", &config).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_maps_to_invalid_key() {
        let client = client_for(test_server::respond_once("401 Unauthorized", "{}").await).await;
        let err = AnalysisError::from(client.complete("hi").await.unwrap_err());
        assert!(matches!(err, AnalysisError::Provider(ref m) if m.contains("Invalid Anthropic API key")), "{:?}", err);
    }

    #[tokio::test]
    async fn rate_limit_has_its_own_message() {
        let client = client_for(test_server::respond_once("429 Too Many Requests", "{}").await).await;
        let err = AnalysisError::from(client.complete("hi").await.unwrap_err());
        assert!(matches!(err, AnalysisError::Provider(ref m) if m.contains("Rate limited")), "{:?}", err);
    }

    #[tokio::test]
    async fn stalled_server_maps_to_timeout() {
        let client = client_for(test_server::stalled().await).await;
        let err = AnalysisError::from(client.complete("hi").await.unwrap_err());
        assert!(matches!(err, AnalysisError::Timeout), "{:?}", err);
    }

    #[tokio::test]
    async fn overloaded_body_is_described() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let client = client_for(test_server::respond_once("529 Site Overloaded", body).await).await;
        let err = client.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("overloaded_error - Overloaded"), "{}", err);
    }

    #[test]
    fn structured_error_body_is_unpacked() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(describe_error(529, body), "API error (529): overloaded_error - Overloaded");
        assert_eq!(describe_error(500, "oops"), "API error (500): oops");
    }

    #[test]
    fn last_text_block_skips_non_text() {
        let raw = r#"{"content":[{"type":"thinking","text":null},{"type":"text","text":"first"},{"type":"text","text":"{\"ok\":true}"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(last_text_block(parsed).as_deref(), Some("{\"ok\":true}"));
    }
}
