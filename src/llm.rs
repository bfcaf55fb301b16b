use async_trait::async_trait;
use std::sync::Arc;

use crate::anthropic::AnthropicClient;
use crate::config::{InsightsConfig, ProviderKind};
use crate::error::Result;
use crate::openai::OpenAIClient;

/// A hosted language model: one prompt in, one text completion out.
///
/// Implementations own their request timeout and do not retry.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the configured provider, or `None` when no API key is set
pub fn provider_from_config(config: &InsightsConfig) -> Result<Option<Arc<dyn LanguageModel>>> {
    let api_key = match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key,
        _ => return Ok(None),
    };

    let provider: Arc<dyn LanguageModel> = match config.provider {
        ProviderKind::OpenAi => Arc::new(OpenAIClient::new(api_key, config)?),
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(api_key, config)?),
    };
    Ok(Some(provider))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_no_provider() {
        let config = InsightsConfig::default();
        assert!(provider_from_config(&config).unwrap().is_none());

        let blank = InsightsConfig { api_key: Some("   ".to_string()), ..InsightsConfig::default() };
        assert!(provider_from_config(&blank).unwrap().is_none());
    }

    #[test]
    fn key_selects_configured_provider() {
        let config = InsightsConfig {
            provider: ProviderKind::Anthropic,
            api_key: Some("sk-ant-test".to_string()),
            ..InsightsConfig::default()
        };
        let provider = provider_from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "anthropic");
    }
}
