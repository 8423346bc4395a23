//! Client construction config.

use bon::Builder;

/// Which family of provider transport a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    /// Backs [`TestTransport`](crate::lm::TestTransport); never dispatches network calls.
    Test,
}

impl Provider {
    /// The environment variable a real provider reads its credential from; `None` for
    /// [`Provider::Test`], which needs no credential.
    pub fn credential_env_var(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Test => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::Test => "test",
        }
    }
}

/// Configuration for one `(provider, model)` client instance.
#[derive(Debug, Clone, Builder)]
pub struct LmClientConfig {
    pub provider: Provider,
    #[builder(into)]
    pub model: String,
    #[builder(default = 0.7)]
    pub temperature: f32,
    #[builder(default = 512)]
    pub max_tokens: u32,
    #[builder(default = true)]
    pub cache: bool,
    #[builder(default = 30_000)]
    pub timeout_ms: u64,
    #[builder(default = 5)]
    pub breaker_failure_threshold: u32,
    #[builder(default = 10_000)]
    pub breaker_window_ms: u64,
    #[builder(default = 10_000)]
    pub breaker_reset_timeout_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_needs_no_credential() {
        assert_eq!(Provider::Test.credential_env_var(), None);
    }

    #[test]
    fn real_providers_name_their_env_var() {
        assert_eq!(Provider::OpenAi.credential_env_var(), Some("OPENAI_API_KEY"));
        assert_eq!(
            Provider::Anthropic.credential_env_var(),
            Some("ANTHROPIC_API_KEY")
        );
        assert_eq!(Provider::Gemini.credential_env_var(), Some("GEMINI_API_KEY"));
    }

    #[test]
    fn builder_applies_defaults() {
        let config = LmClientConfig::builder()
            .provider(Provider::Test)
            .model("dummy")
            .build();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 512);
        assert!(config.cache);
    }
}
