//! Pluggable model capability traits.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Every pipeline component receives these
//! as trait objects, so tests swap in scripted fakes.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Chat completion capability.
///
/// Implementations handle the transport layer (HTTP, SDK calls, timeouts)
/// for a specific provider while presenting a uniform interface to agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"azure"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;
}

/// Text embedding capability, consumed by vector-backed search indexes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedder name for logging.
    fn name(&self) -> &'static str;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] or a transport error.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError>;
}
