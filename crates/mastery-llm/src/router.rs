//! Provider routing
//!
//! Maps a model name to the provider that serves it. Each provider owns a
//! tokens-per-minute budget and, optionally, the environment variable that
//! must hold its API key.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One LLM provider and its limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name (also the rate limiter key)
    pub name: String,
    /// Case-insensitive substrings identifying the provider's models
    pub model_patterns: Vec<String>,
    /// Token budget per 60 second window
    pub tokens_per_minute: u64,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    /// Create a provider without a credential check
    #[must_use]
    pub fn new(name: &str, patterns: &[&str], tokens_per_minute: u64) -> Self {
        Self {
            name: name.to_string(),
            model_patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
            tokens_per_minute,
            api_key_env: None,
        }
    }

    /// Require `var` to be set before the provider is used
    #[must_use]
    pub fn with_api_key_env(mut self, var: &str) -> Self {
        self.api_key_env = Some(var.to_string());
        self
    }

    /// Anthropic defaults (conservative for an 8K TPM tier)
    #[must_use]
    pub fn anthropic() -> Self {
        Self::new("anthropic", &["claude"], 7500).with_api_key_env("ANTHROPIC_API_KEY")
    }

    /// OpenAI defaults
    #[must_use]
    pub fn openai() -> Self {
        Self::new("openai", &["gpt"], 90_000).with_api_key_env("OPENAI_API_KEY")
    }

    /// Whether `model` belongs to this provider
    #[must_use]
    pub fn serves(&self, model: &str) -> bool {
        let model = model.to_lowercase();
        self.model_patterns
            .iter()
            .any(|p| model.contains(p.to_lowercase().as_str()))
    }

    /// Fail when the provider's API key variable is unset or empty
    pub fn check_credentials(&self) -> Result<()> {
        let Some(var) = &self.api_key_env else {
            return Ok(());
        };
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(()),
            _ => Err(Error::NotConfigured {
                provider: self.name.clone(),
                reason: format!("{var} not set"),
            }),
        }
    }
}

/// Default provider list
#[must_use]
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::anthropic(), ProviderConfig::openai()]
}

/// Ordered provider lookup
#[derive(Debug, Clone)]
pub struct ProviderRouter {
    providers: Vec<ProviderConfig>,
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new(default_providers())
    }
}

impl ProviderRouter {
    /// Create a router; earlier providers win when patterns overlap
    #[must_use]
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    /// Configured providers
    #[must_use]
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Provider serving `model`
    pub fn resolve(&self, model: &str) -> Result<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.serves(model))
            .ok_or_else(|| Error::UnknownProvider(model.to_string()))
    }
}
