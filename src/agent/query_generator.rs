//! Query generator agent.
//!
//! Turns the user's question plus earlier queries and review rationales
//! into the next search query, phrased in the vocabulary the documents
//! are likely to use.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::config::AgentConfig;
use super::conversation::Conversation;
use super::prompt::{build_query_prompt, strip_code_fences, truncate_chars};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

/// Longest query sent to the index, in characters.
const MAX_QUERY_CHARS: usize = 1_000;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    search_query: String,
}

/// Agent that writes search queries.
pub struct QueryGenerator {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl QueryGenerator {
    /// Creates a new query generator with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.query_model.clone(),
            max_tokens: config.query_max_tokens,
            system_prompt,
        }
    }

    /// Generates the next query and records it on the conversation.
    ///
    /// Never fails: if the model call or its parsing fails, the user's
    /// question is used as the query. Either way exactly one attempt is
    /// recorded.
    pub async fn generate(&self, provider: &dyn LlmProvider, conversation: &mut Conversation) -> String {
        let attempt = conversation.attempts() + 1;
        let prompt = build_query_prompt(
            conversation.user_query(),
            conversation.search_history(),
            conversation.reviews(),
        );

        let query = match self.request_query(provider, &prompt, conversation).await {
            Ok(query) => {
                debug!(attempt, query = %query, "generated search query");
                query
            }
            Err(e) => {
                warn!(attempt, error = %e, "query generation failed, falling back to the user question");
                conversation.user_query().to_string()
            }
        };

        conversation.record_search_attempt(query.clone());
        query
    }

    async fn request_query(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        conversation: &mut Conversation,
    ) -> Result<String, AgentError> {
        let response = self.execute(provider, prompt).await?;
        conversation.add_usage(response.usage);
        Self::parse_query(&response.content)
    }

    /// Parses the model response into a query string.
    ///
    /// Accepts `{"search_query": "..."}` (optionally fenced) or a bare
    /// `search_query: ...` line.
    fn parse_query(content: &str) -> Result<String, AgentError> {
        let body = strip_code_fences(content);

        let parsed = serde_json::from_str::<QueryResponse>(body)
            .map(|r| r.search_query)
            .ok()
            .or_else(|| {
                body.lines().find_map(|line| {
                    line.trim()
                        .strip_prefix("search_query:")
                        .map(|rest| rest.trim().trim_matches('"').to_string())
                })
            });

        let mut query = parsed
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AgentError::ResponseParse {
                message: "response did not contain a search query".to_string(),
                content: content.to_string(),
            })?;

        truncate_chars(&mut query, MAX_QUERY_CHARS);
        Ok(query)
    }
}

#[async_trait]
impl Agent for QueryGenerator {
    fn name(&self) -> &'static str {
        "query_generator"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn temperature(&self) -> f32 {
        0.2
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
