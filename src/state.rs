//! Shared application state.
//!
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds a handle to the relay task (which owns all mutable session state)
//! and the optional LLM client.

use std::sync::Arc;

use crate::llm::LlmComplete;
use crate::relay::RelayHandle;

/// Shared application state. Clone is required by Axum — the relay handle is
/// an mpsc sender and the LLM client is Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub relay: RelayHandle,
    /// Optional LLM client. `None` if LLM env vars are not configured; AI
    /// endpoints then serve their fallbacks.
    pub llm: Option<Arc<dyn LlmComplete>>,
}

impl AppState {
    #[must_use]
    pub fn new(relay: RelayHandle, llm: Option<Arc<dyn LlmComplete>>) -> Self {
        Self { relay, llm }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
