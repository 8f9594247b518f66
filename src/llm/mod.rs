//! LLM — multi-provider adapter for the AI lesson tooling.
//!
//! DESIGN
//! ======
//! The workspace treats the model as an opaque text-completion service, so
//! the adapter surface is a single [`LlmComplete`] trait. The `LlmClient`
//! enum dispatches to Anthropic or `OpenAI` based on `LLM_PROVIDER`;
//! misconfiguration is non-fatal upstream (the server runs with AI features
//! degraded to fallbacks).

pub mod anthropic;
pub mod config;
pub mod openai;

mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::{LlmComplete, LlmError, Message};

// =============================================================================
// CLIENT DISPATCH
// =============================================================================

/// Concrete LLM client, configured from environment variables by
/// [`LlmClient::from_env`].
pub struct LlmClient {
    inner: LlmProvider,
    model: String,
}

enum LlmProvider {
    Anthropic(anthropic::AnthropicClient),
    OpenAi(openai::OpenAiClient),
}

impl LlmClient {
    /// Build an LLM client from environment variables (see
    /// [`LlmConfig::from_env`] for the variable set).
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let model = config.model.clone();
        let inner = match config.provider {
            LlmProviderKind::Anthropic => {
                LlmProvider::Anthropic(anthropic::AnthropicClient::new(config.api_key, config.timeouts)?)
            }
            LlmProviderKind::OpenAi => LlmProvider::OpenAi(openai::OpenAiClient::new(
                config.api_key,
                config.openai_base_url,
                config.timeouts,
            )?),
        };
        Ok(Self { inner, model })
    }

    /// Return the configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait::async_trait]
impl LlmComplete for LlmClient {
    async fn complete(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<String, LlmError> {
        match &self.inner {
            LlmProvider::Anthropic(c) => c.complete(&self.model, max_tokens, system, messages).await,
            LlmProvider::OpenAi(c) => c.complete(&self.model, max_tokens, system, messages).await,
        }
    }
}
