use crate::error::{InsightsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Appended to a digest clipped at `DigestLimits::max_chars`
pub const DIGEST_TRUNCATION_MARKER: &str = "\n[digest truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    pub fn from_str(s: &str) -> Option<ProviderKind> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(ProviderKind::OpenAi),
            "anthropic" | "claude" => Some(ProviderKind::Anthropic),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => DEFAULT_OPENAI_MODEL,
            ProviderKind::Anthropic => DEFAULT_ANTHROPIC_MODEL,
        }
    }
}

/// Bounds on the history digest sent to the language model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestLimits {
    pub max_turns: usize,
    pub max_turn_chars: usize,
    pub max_entries: usize,
    pub max_chars: usize,
}

impl Default for DigestLimits {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_turn_chars: 600,
            max_entries: 50,
            max_chars: 12_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_retention_days: i64,
    pub provider: ProviderKind,
    /// Without a key the engine runs heuristic-only.
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Overrides the provider's API origin, e.g. for a proxy
    pub api_base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub digest: DigestLimits,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        let data_dir = home_dir().join(".daily-insights");
        Self {
            database_path: data_dir.join("insights.db"),
            log_dir: data_dir.join("logs"),
            log_retention_days: 7,
            provider: ProviderKind::OpenAi,
            api_key: None,
            model: None,
            api_base_url: None,
            temperature: 0.1,
            max_tokens: 1200,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            digest: DigestLimits::default(),
        }
    }
}

fn home_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home)
}

impl InsightsConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: InsightsConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("INSIGHTS_DB_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(dir) = var("INSIGHTS_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(provider) = var("INSIGHTS_PROVIDER") {
            self.provider = ProviderKind::from_str(&provider).ok_or_else(|| {
                InsightsError::Config(format!("Unknown provider: {}", provider))
            })?;
        }
        if let Some(model) = var("INSIGHTS_MODEL") {
            self.model = Some(model);
        }
        if let Some(base) = var("INSIGHTS_API_BASE_URL").filter(|b| !b.trim().is_empty()) {
            self.api_base_url = Some(base);
        }

        let key_var = match self.provider {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        };
        if let Some(key) = var(key_var).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(InsightsError::Config("Timeouts must be greater than zero".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(InsightsError::Config("max_tokens must be greater than zero".to_string()));
        }
        let d = &self.digest;
        if d.max_turns == 0 || d.max_turn_chars == 0 || d.max_entries == 0 || d.max_chars == 0 {
            return Err(InsightsError::Config("Digest limits must be greater than zero".to_string()));
        }
        if d.max_chars <= DIGEST_TRUNCATION_MARKER.chars().count() {
            return Err(InsightsError::Config(format!(
                "digest.max_chars must exceed {} characters", DIGEST_TRUNCATION_MARKER.chars().count()
            )));
        }
        Ok(())
    }

    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or_else(|| self.provider.default_model())
    }

    /// Full endpoint URL for `path`, honoring `api_base_url` when set
    pub fn endpoint(&self, default_base: &str, path: &str) -> String {
        let base = self.api_base_url.as_deref().unwrap_or(default_base);
        format!("{}{}", base.trim_end_matches('/'), path)
    }
}
