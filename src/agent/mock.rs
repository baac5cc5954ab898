//! Scripted fakes for the model and index capabilities.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, ChatResponse, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::core::EvidenceItem;
use crate::error::{AgentError, RetrievalError};
use crate::search::{SearchIndex, SearchRequest};

pub const QUERY_MODEL: &str = "query-model";
pub const REVIEW_MODEL: &str = "review-model";
pub const ANSWER_MODEL: &str = "answer-model";

/// Config whose three agents use distinct model names so the scripted
/// provider can route by model.
pub fn test_config() -> AgentConfig {
    AgentConfig::builder()
        .api_key("test")
        .query_model(QUERY_MODEL)
        .review_model(REVIEW_MODEL)
        .answer_model(ANSWER_MODEL)
        .build()
        .unwrap_or_else(|_| unreachable!())
}

/// Provider that replays queued responses per model name.
///
/// A model with no queued response fails with [`AgentError::ApiRequest`].
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<HashMap<String, VecDeque<Result<String, String>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ok(self, model: &str, content: impl Into<String>) -> Self {
        self.push(model, Ok(content.into()));
        self
    }

    pub fn err(self, model: &str, message: impl Into<String>) -> Self {
        self.push(model, Err(message.into()));
        self
    }

    fn push(&self, model: &str, response: Result<String, String>) {
        self.responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(model.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, model: &str) -> usize {
        self.requests().iter().filter(|r| r.model == model).count()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.clone());

        let next = self
            .responses
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Ok(content)) => Ok(ChatResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                },
                finish_reason: Some("stop".to_string()),
            }),
            Some(Err(message)) => Err(AgentError::ApiRequest {
                message,
                status: Some(500),
            }),
            None => Err(AgentError::ApiRequest {
                message: format!("no scripted response for {}", request.model),
                status: None,
            }),
        }
    }
}

/// Index that returns queued batches in order and records each request's
/// exclusion set.
#[derive(Default)]
pub struct ScriptedIndex {
    batches: Mutex<VecDeque<Result<Vec<EvidenceItem>, String>>>,
    excluded: Mutex<Vec<HashSet<String>>>,
    calls: AtomicUsize,
}

impl ScriptedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(self, items: Vec<EvidenceItem>) -> Self {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Ok(items));
        self
    }

    pub fn failure(self, message: &str) -> Self {
        self.batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn excluded(&self) -> Vec<HashSet<String>> {
        self.excluded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SearchIndex for ScriptedIndex {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<EvidenceItem>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.excluded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(request.exclude_ids.clone());

        let next = self
            .batches
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();

        match next {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(RetrievalError::Transport(message)),
            None => Ok(Vec::new()),
        }
    }
}

pub fn items(ids: &[&str]) -> Vec<EvidenceItem> {
    ids.iter()
        .map(|id| EvidenceItem::new(*id, "City Transit", format!("passage {id}")))
        .collect()
}
