//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] and [`Embedder`]
//! implementations.

use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::provider::{Embedder, LlmProvider};
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Chat and embedding capabilities resolved from one configuration.
#[derive(Clone)]
pub struct Providers {
    /// Chat completion capability.
    pub llm: Arc<dyn LlmProvider>,
    /// Embedding capability for vector search.
    pub embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("llm", &self.llm.name())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

fn shared<P>(provider: P) -> Providers
where
    P: LlmProvider + Embedder + 'static,
{
    let provider = Arc::new(provider);
    Providers {
        llm: provider.clone(),
        embedder: provider,
    }
}

/// Creates providers based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` (default): OpenAI-compatible APIs via `async-openai`
/// - `"azure"`: Azure `OpenAI` deployments
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names
/// and [`AgentError::Config`] when provider settings are incomplete.
pub fn create_provider(config: &AgentConfig) -> Result<Providers, AgentError> {
    match config.provider.as_str() {
        "openai" => Ok(shared(OpenAiProvider::new(config)?)),
        "azure" => Ok(shared(OpenAiProvider::azure(config)?)),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
