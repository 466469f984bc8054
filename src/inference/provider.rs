//! Provider selection and per-provider settings

use super::anthropic::AnthropicClient;
use super::client::{InferenceClient, ResponseScreen};
use super::gemini::GeminiClient;
use super::openai::OpenAiClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Supported provider APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Settings block for this provider
    pub fn settings<'a>(&self, providers: &'a ProvidersConfig) -> &'a ProviderSettings {
        match self {
            ProviderKind::Anthropic => &providers.anthropic,
            ProviderKind::OpenAi => &providers.openai,
            ProviderKind::Gemini => &providers.gemini,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection and model settings for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Name used for result directories and timing files
    pub label: String,
    /// Model identifier sent to the API
    pub model: String,
    /// API endpoint (Gemini: base URL up to `/models`)
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Max output tokens
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> crate::Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(crate::Error::Config(format!(
                "{} is not set; export it to call {}",
                self.api_key_env, self.model
            ))),
        }
    }
}

/// Settings for every supported provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub anthropic: ProviderSettings,
    pub openai: ProviderSettings,
    pub gemini: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic: ProviderSettings {
                label: "claude".to_string(),
                model: "claude-3-opus-20240229".to_string(),
                endpoint: "https://api.anthropic.com/v1/messages".to_string(),
                api_key_env: "ANTHROPIC_API_KEY".to_string(),
                max_tokens: 1024,
                timeout_secs: 120,
            },
            openai: ProviderSettings {
                label: "gpt4o".to_string(),
                model: "gpt-4o".to_string(),
                endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                max_tokens: 1024,
                timeout_secs: 120,
            },
            gemini: ProviderSettings {
                label: "gemini_flash".to_string(),
                model: "gemini-1.5-flash-latest".to_string(),
                endpoint: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
                api_key_env: "GOOGLE_API_KEY".to_string(),
                max_tokens: 1024,
                timeout_secs: 120,
            },
        }
    }
}

/// Build the client for `kind` using the loaded configuration.
pub fn build_client(
    kind: ProviderKind,
    config: &crate::app::config::Config,
) -> crate::Result<Box<dyn InferenceClient>> {
    let settings = kind.settings(&config.providers).clone();
    let api_key = settings.api_key()?;
    let screen = ResponseScreen::new(config.screen.clone());

    let client: Box<dyn InferenceClient> = match kind {
        ProviderKind::Anthropic => Box::new(AnthropicClient::new(settings, api_key, screen)?),
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(settings, api_key, screen)?),
        ProviderKind::Gemini => Box::new(GeminiClient::new(settings, api_key, screen)?),
    };
    Ok(client)
}

/// HTTP client with the provider's timeout
pub(crate) fn http_client(settings: &ProviderSettings) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.timeout())
        .build()
        .map_err(|e| crate::Error::Provider(format!("failed to build HTTP client: {}", e)))
}
