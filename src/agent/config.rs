//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;
use crate::search::DEFAULT_TOP_K;

/// Default bound on search attempts per conversation.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
/// Default query-generator max tokens.
const DEFAULT_QUERY_MAX_TOKENS: u32 = 512;
/// Default reviewer max tokens. Rationales can run long on broad questions.
const DEFAULT_REVIEW_MAX_TOKENS: u32 = 2048;
/// Default answer max tokens.
const DEFAULT_ANSWER_MAX_TOKENS: u32 = 4096;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-2024-08-06";
/// Default embedding model (3072 dimensions).
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
/// Default Azure OpenAI API version.
const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (`"openai"` or `"azure"`).
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (proxies, compatible APIs, Azure endpoint).
    pub base_url: Option<String>,
    /// API version, used by Azure deployments.
    pub api_version: String,
    /// Azure chat deployment name. Ignored by plain `OpenAI`.
    pub azure_deployment: Option<String>,
    /// Model for the query generator.
    pub query_model: String,
    /// Model for the result reviewer.
    pub review_model: String,
    /// Model for the answer synthesizer.
    pub answer_model: String,
    /// Embedding model (or Azure embedding deployment).
    pub embedding_model: String,
    /// Maximum tokens for generated search queries.
    pub query_max_tokens: u32,
    /// Maximum tokens for review decisions.
    pub review_max_tokens: u32,
    /// Maximum tokens for the final answer.
    pub answer_max_tokens: u32,
    /// Request timeout applied to every model call.
    pub timeout: Duration,
    /// Bound on search iterations per conversation.
    pub max_attempts: usize,
    /// Items returned per search call.
    pub search_top_k: usize,
    /// Directory containing prompt template files.
    ///
    /// When set, the agent system loads system prompts from markdown files
    /// in this directory, falling back to compiled-in defaults for any
    /// missing files.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    azure_deployment: Option<String>,
    query_model: Option<String>,
    review_model: Option<String>,
    answer_model: Option<String>,
    embedding_model: Option<String>,
    query_max_tokens: Option<u32>,
    review_max_tokens: Option<u32>,
    answer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_attempts: Option<usize>,
    search_top_k: Option<usize>,
    prompt_dir: Option<PathBuf>,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RFP_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("RFP_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("RFP_BASE_URL"))
                .ok();
        }
        if self.api_version.is_none() {
            self.api_version = std::env::var("RFP_API_VERSION").ok();
        }
        if self.azure_deployment.is_none() {
            self.azure_deployment = std::env::var("RFP_AZURE_DEPLOYMENT").ok();
        }
        if self.query_model.is_none() {
            self.query_model = std::env::var("RFP_QUERY_MODEL").ok();
        }
        if self.review_model.is_none() {
            self.review_model = std::env::var("RFP_REVIEW_MODEL").ok();
        }
        if self.answer_model.is_none() {
            self.answer_model = std::env::var("RFP_ANSWER_MODEL").ok();
        }
        if self.embedding_model.is_none() {
            self.embedding_model = std::env::var("RFP_EMBEDDING_MODEL").ok();
        }
        if self.max_attempts.is_none() {
            self.max_attempts = env_parse("RFP_MAX_ATTEMPTS");
        }
        if self.search_top_k.is_none() {
            self.search_top_k = env_parse("RFP_SEARCH_TOP_K");
        }
        if self.timeout.is_none() {
            self.timeout = env_parse::<u64>("RFP_TIMEOUT_SECS").map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RFP_PROMPT_DIR").ok().map(PathBuf::from);
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Sets the Azure chat deployment name.
    #[must_use]
    pub fn azure_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.azure_deployment = Some(deployment.into());
        self
    }

    /// Sets the query generator model.
    #[must_use]
    pub fn query_model(mut self, model: impl Into<String>) -> Self {
        self.query_model = Some(model.into());
        self
    }

    /// Sets the reviewer model.
    #[must_use]
    pub fn review_model(mut self, model: impl Into<String>) -> Self {
        self.review_model = Some(model.into());
        self
    }

    /// Sets the answer model.
    #[must_use]
    pub fn answer_model(mut self, model: impl Into<String>) -> Self {
        self.answer_model = Some(model.into());
        self
    }

    /// Sets the embedding model.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Sets the reviewer max tokens.
    #[must_use]
    pub const fn review_max_tokens(mut self, n: u32) -> Self {
        self.review_max_tokens = Some(n);
        self
    }

    /// Sets the answer max tokens.
    #[must_use]
    pub const fn answer_max_tokens(mut self, n: u32) -> Self {
        self.answer_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the bound on search attempts.
    #[must_use]
    pub const fn max_attempts(mut self, n: usize) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Sets the number of items returned per search.
    #[must_use]
    pub const fn search_top_k(mut self, n: usize) -> Self {
        self.search_top_k = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;
        let chat_model = || DEFAULT_CHAT_MODEL.to_string();

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            azure_deployment: self.azure_deployment,
            query_model: self.query_model.unwrap_or_else(chat_model),
            review_model: self.review_model.unwrap_or_else(chat_model),
            answer_model: self.answer_model.unwrap_or_else(chat_model),
            embedding_model: self
                .embedding_model
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            query_max_tokens: self.query_max_tokens.unwrap_or(DEFAULT_QUERY_MAX_TOKENS),
            review_max_tokens: self.review_max_tokens.unwrap_or(DEFAULT_REVIEW_MAX_TOKENS),
            answer_max_tokens: self.answer_max_tokens.unwrap_or(DEFAULT_ANSWER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            search_top_k: self.search_top_k.unwrap_or(DEFAULT_TOP_K).max(1),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.search_top_k, 5);
        assert_eq!(config.query_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("azure")
            .azure_deployment("gpt4o-prod")
            .review_model("gpt-4o-mini")
            .max_attempts(0)
            .search_top_k(8)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "azure");
        assert_eq!(config.azure_deployment.as_deref(), Some("gpt4o-prod"));
        assert_eq!(config.review_model, "gpt-4o-mini");
        assert_eq!(config.max_attempts, 0);
        assert_eq!(config.search_top_k, 8);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_top_k_clamped() {
        let config = AgentConfig::builder()
            .api_key("key")
            .search_top_k(0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.search_top_k, 1);
    }
}
