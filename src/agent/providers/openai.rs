//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! One type covers both plain `OpenAI`-compatible endpoints and Azure
//! deployments; the difference lives entirely in the `async-openai`
//! [`Config`] it is built with.

use async_openai::Client;
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateEmbeddingRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::{Embedder, LlmProvider};
use crate::error::AgentError;

/// `OpenAI`-compatible chat and embedding provider.
///
/// Holds two clients because Azure routes chat and embeddings to
/// different deployments. For plain `OpenAI` both share one config.
pub struct OpenAiProvider<C: Config> {
    name: &'static str,
    chat: Client<C>,
    embeddings: Client<C>,
    embedding_model: String,
    timeout_secs: u64,
}

fn http_client(config: &AgentConfig) -> Result<reqwest::Client, AgentError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| AgentError::Config {
            message: format!("HTTP client: {e}"),
        })
}

impl OpenAiProvider<OpenAIConfig> {
    /// Creates a provider for `OpenAI` or any compatible API.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = Client::with_config(openai_config).with_http_client(http_client(config)?);

        Ok(Self {
            name: "openai",
            chat: client.clone(),
            embeddings: client,
            embedding_model: config.embedding_model.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

impl OpenAiProvider<AzureConfig> {
    /// Creates a provider for an Azure `OpenAI` resource.
    ///
    /// The chat client targets `azure_deployment`; the embeddings client
    /// targets a deployment named after `embedding_model`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if the endpoint or chat deployment
    /// is missing, or the HTTP client cannot be built.
    pub fn azure(config: &AgentConfig) -> Result<Self, AgentError> {
        let endpoint = config.base_url.as_deref().ok_or_else(|| AgentError::Config {
            message: "azure provider requires OPENAI_BASE_URL or RFP_BASE_URL".to_string(),
        })?;
        let deployment = config
            .azure_deployment
            .as_deref()
            .ok_or_else(|| AgentError::Config {
                message: "azure provider requires RFP_AZURE_DEPLOYMENT".to_string(),
            })?;

        let base = AzureConfig::new()
            .with_api_base(endpoint)
            .with_api_key(&config.api_key)
            .with_api_version(&config.api_version);
        let http = http_client(config)?;

        Ok(Self {
            name: "azure",
            chat: Client::with_config(base.clone().with_deployment_id(deployment))
                .with_http_client(http.clone()),
            embeddings: Client::with_config(base.with_deployment_id(&config.embedding_model))
                .with_http_client(http),
            embedding_model: config.embedding_model.clone(),
            timeout_secs: config.timeout.as_secs(),
        })
    }
}

impl<C: Config> OpenAiProvider<C> {
    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = if request.json_mode {
            Some(ResponseFormat::JsonObject)
        } else {
            None
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            response_format,
            ..Default::default()
        }
    }

    fn map_error(&self, err: OpenAIError) -> AgentError {
        match err {
            OpenAIError::Reqwest(ref e) if e.is_timeout() => AgentError::Timeout {
                seconds: self.timeout_secs,
            },
            OpenAIError::Reqwest(ref e) => AgentError::ApiRequest {
                message: err.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            other => AgentError::ApiRequest {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl<C: Config> std::fmt::Debug for OpenAiProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("client", &"<async-openai::Client>")
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

#[async_trait]
impl<C: Config + Send + Sync + 'static> LlmProvider for OpenAiProvider<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .chat
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| self.map_error(e))?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        debug!(model = %request.model, tokens = usage.total_tokens, "chat completion");

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }
}

#[async_trait]
impl<C: Config + Send + Sync + 'static> Embedder for OpenAiProvider<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.embedding_model)
            .input(text)
            .build()
            .map_err(|e| AgentError::Embedding {
                message: e.to_string(),
            })?;

        let response = self
            .embeddings
            .embeddings()
            .create(request)
            .await
            .map_err(|e| self.map_error(e))?;

        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| AgentError::Embedding {
                message: "response contained no embedding".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message;

    type Provider = OpenAiProvider<OpenAIConfig>;

    #[test]
    fn test_convert_system_message() {
        let msg = message::system_message("test");
        let converted = Provider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_user_message() {
        let msg = message::user_message("hello");
        let converted = Provider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_convert_assistant_message() {
        let msg = message::assistant_message("earlier answer");
        let converted = Provider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::Assistant(_)));
    }

    #[test]
    fn test_build_request_json_mode() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![message::user_message("test")],
            temperature: Some(0.0),
            max_tokens: Some(100),
            json_mode: true,
        };
        let built = Provider::build_request(&request);
        assert!(built.response_format.is_some());
        assert_eq!(built.max_completion_tokens, Some(100));
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    fn test_build_request_plain_text() {
        let request = ChatRequest {
            model: "gpt-4o".to_string(),
            messages: vec![message::system_message("s"), message::user_message("u")],
            temperature: None,
            max_tokens: None,
            json_mode: false,
        };
        let built = Provider::build_request(&request);
        assert!(built.response_format.is_none());
        assert_eq!(built.messages.len(), 2);
    }

    #[test]
    fn test_azure_requires_deployment() {
        let config = AgentConfig::builder()
            .api_key("k")
            .provider("azure")
            .base_url("https://res.openai.azure.com")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = OpenAiProvider::azure(&config);
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_azure_provider_name() {
        let config = AgentConfig::builder()
            .api_key("k")
            .provider("azure")
            .base_url("https://res.openai.azure.com")
            .azure_deployment("gpt4o")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = OpenAiProvider::azure(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(LlmProvider::name(&provider), "azure");
    }
}
