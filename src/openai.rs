use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use crate::llm::LanguageModel;

const OPENAI_API_BASE: &str = "https://api.openai.com";
const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const PROVIDER: &str = "openai";

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAIClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIClient {
    pub fn new(api_key: &str, config: &InsightsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.endpoint(OPENAI_API_BASE, CHAT_COMPLETIONS_PATH),
            api_key: api_key.to_string(),
            model: config.model_name().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens: max_tokens.or(Some(self.max_tokens)),
        };

        let response = self.client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 {
                return Err(InsightsError::provider(PROVIDER, "Invalid API key"));
            } else if status.as_u16() == 429 {
                return Err(InsightsError::provider(PROVIDER, "Rate limited - too many requests"));
            }

            return Err(InsightsError::provider(
                PROVIDER,
                format!("API error ({}): {}", status, error_text),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| InsightsError::provider(PROVIDER, "No response from OpenAI"))
    }
}

#[async_trait]
impl LanguageModel for OpenAIClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }];
        self.chat_completion(messages, self.temperature, None).await
    }
}
