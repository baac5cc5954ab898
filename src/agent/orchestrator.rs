//! Loop controller for the retrieval/review/synthesis workflow.
//!
//! Drives one [`Conversation`] through an explicit two-state machine:
//! while [`LoopState::Searching`], generate a query, retrieve and review;
//! on [`LoopState::Finalizing`], synthesize the answer once and return.
//! Every component degrades instead of failing, so a run always ends with
//! an answer.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::conversation::{Conversation, ConversationRequest, ConversationResult, LoopState};
use super::history::{ChatHistoryStore, HistoryEntry, MAX_REPLAYED_TURNS, TurnKind};
use super::message::ChatMessage;
use super::prompt::PromptSet;
use super::provider::LlmProvider;
use super::query_generator::QueryGenerator;
use super::retriever::Retriever;
use super::reviewer::ResultReviewer;
use super::synthesizer::AnswerSynthesizer;
use crate::search::SearchIndex;

/// Runs conversations against a model provider and a search index.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    index: Arc<dyn SearchIndex>,
    history: Option<Arc<dyn ChatHistoryStore>>,
    config: AgentConfig,
    query_generator: QueryGenerator,
    retriever: Retriever,
    reviewer: ResultReviewer,
    synthesizer: AnswerSynthesizer,
}

impl Orchestrator {
    /// Creates an orchestrator.
    ///
    /// Loads prompt templates from the directory specified in
    /// [`AgentConfig::prompt_dir`], falling back to compiled-in defaults.
    pub fn new(provider: Arc<dyn LlmProvider>, index: Arc<dyn SearchIndex>, config: AgentConfig) -> Self {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        Self::with_prompts(provider, index, config, prompts)
    }

    /// Creates an orchestrator with an explicit prompt set.
    pub fn with_prompts(
        provider: Arc<dyn LlmProvider>,
        index: Arc<dyn SearchIndex>,
        config: AgentConfig,
        prompts: PromptSet,
    ) -> Self {
        Self {
            query_generator: QueryGenerator::new(&config, prompts.query),
            retriever: Retriever::new(config.search_top_k),
            reviewer: ResultReviewer::new(&config, prompts.review),
            synthesizer: AnswerSynthesizer::new(&config, prompts.answer),
            provider,
            index,
            history: None,
            config,
        }
    }

    /// Records session turns in `store` and replays them to the synthesizer.
    #[must_use]
    pub fn with_history(mut self, store: Arc<dyn ChatHistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    /// Answers one question with the configured attempt bound.
    pub async fn run_conversation(&self, user_query: &str, scope_filter: Option<&str>) -> ConversationResult {
        let mut request = ConversationRequest::new(user_query);
        request.scope_filter = scope_filter.map(str::to_string);
        self.run(request).await
    }

    /// Answers one question described by `request`.
    pub async fn run(&self, request: ConversationRequest) -> ConversationResult {
        let mut conversation = Conversation::from_request(request, self.config.max_attempts);
        let answer = self.drive(&mut conversation).await;
        conversation.into_result(answer)
    }

    /// Runs the loop to completion on `conversation` and returns the answer.
    ///
    /// The conversation is left in its final state for inspection. Each
    /// conversation is single-use: driving one that already finalized only
    /// re-runs synthesis.
    pub async fn drive(&self, conversation: &mut Conversation) -> String {
        let start = Instant::now();
        info!(
            session = conversation.session_id(),
            scope = conversation.scope_filter().unwrap_or("*"),
            max_attempts = conversation.max_attempts(),
            "conversation started"
        );

        let prior_turns = self.prior_turns(conversation).await;
        self.record_turn(conversation, TurnKind::Question, conversation.user_query())
            .await;

        while conversation.state() == LoopState::Searching {
            self.search_step(conversation).await;
        }

        let answer = self
            .synthesizer
            .synthesize(self.provider.as_ref(), conversation, &prior_turns)
            .await;
        self.record_turn(conversation, TurnKind::Answer, &answer).await;

        info!(
            attempts = conversation.attempts(),
            vetted = conversation.vetted_results().len(),
            discarded = conversation.discarded_results().len(),
            warnings = conversation.warnings().len(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "conversation finished"
        );
        answer
    }

    async fn search_step(&self, conversation: &mut Conversation) {
        let query = self
            .query_generator
            .generate(self.provider.as_ref(), conversation)
            .await;
        self.record_turn(conversation, TurnKind::SearchQuery, &query).await;

        let found = self
            .retriever
            .retrieve(self.index.as_ref(), conversation, &query)
            .await;
        debug!(attempt = conversation.attempts(), found, "search step retrieved");

        self.reviewer
            .review(self.provider.as_ref(), conversation)
            .await;
    }

    async fn prior_turns(&self, conversation: &Conversation) -> Vec<ChatMessage> {
        let Some(store) = &self.history else {
            return Vec::new();
        };
        match store.history(conversation.session_id()).await {
            Ok(entries) => {
                let replayable: Vec<ChatMessage> = entries
                    .iter()
                    .filter(|e| e.kind.is_replayed())
                    .map(HistoryEntry::to_message)
                    .collect();
                let skip = replayable.len().saturating_sub(MAX_REPLAYED_TURNS);
                replayable.into_iter().skip(skip).collect()
            }
            Err(e) => {
                warn!(error = %e, "could not load session history");
                Vec::new()
            }
        }
    }

    async fn record_turn(&self, conversation: &Conversation, kind: TurnKind, message: &str) {
        let Some(store) = &self.history else {
            return;
        };
        let entry = HistoryEntry::new(
            conversation.session_id(),
            conversation.user_id().map(str::to_string),
            kind,
            message,
        );
        if let Err(e) = store.append(entry).await {
            warn!(error = %e, ?kind, "could not record session turn");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("index", &self.index.name())
            .field("history", &self.history.is_some())
            .field("max_attempts", &self.config.max_attempts)
            .field("top_k", &self.retriever.top_k())
            .finish_non_exhaustive()
    }
}
