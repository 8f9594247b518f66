//! LLM types — provider-neutral completion types and errors.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by LLM client operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the LLM provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The LLM provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The LLM provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// MESSAGES
// =============================================================================

/// A single turn in a conversation. Content is plain text — the workspace
/// treats the model as an opaque text-completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }
}

// =============================================================================
// COMPLETION TRAIT
// =============================================================================

/// Provider-neutral async trait for text completion. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LlmComplete: Send + Sync {
    /// Send a completion request and return the model's text.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] if the request fails, the response is
    /// malformed, or the API key is absent.
    async fn complete(&self, max_tokens: u32, system: &str, messages: &[Message]) -> Result<String, LlmError>;
}
