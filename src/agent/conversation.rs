//! Per-question conversation state.
//!
//! A [`Conversation`] accumulates everything one question's search loop
//! learns: issued queries, the batch under review, vetted and discarded
//! evidence, reviewer rationales and verdicts, and an audit trace. Its
//! mutating methods keep the bookkeeping invariants:
//!
//! - `processed_ids` is exactly the id set of vetted ∪ discarded items
//! - `attempts == search_history.len()`
//! - `reviews.len() == decisions.len()`

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::agent::config::DEFAULT_MAX_ATTEMPTS;
use crate::agent::message::TokenUsage;
use crate::core::{EvidenceItem, EvidenceRef, Verdict, parse_citations};

/// The two states of the search loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Generate a query, retrieve and review.
    Searching,
    /// Synthesize the answer and stop.
    Finalizing,
}

/// Which reviewer index list an out-of-range index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBucket {
    /// `valid_results`.
    Valid,
    /// `invalid_results`.
    Invalid,
}

/// Reviewer indices dropped because they fell outside the reviewed batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexValidationWarning {
    /// 1-based attempt the review belonged to.
    pub attempt: usize,
    /// List the indices came from.
    pub bucket: IndexBucket,
    /// The dropped indices, as returned by the model.
    pub dropped: Vec<i64>,
    /// Entries that were not integers, as raw JSON text.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unreadable: Vec<String>,
    /// Size of the batch the indices should have addressed.
    pub result_count: usize,
}

/// A reviewer judgment over the current batch.
///
/// Indices are signed because they come from an untrusted model response;
/// [`Conversation::apply_review`] validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Reviewer rationale.
    pub thought_process: String,
    /// Indices judged useful.
    #[serde(default)]
    pub valid_results: Vec<i64>,
    /// Indices judged irrelevant.
    #[serde(default)]
    pub invalid_results: Vec<i64>,
    /// `valid_results` entries that could not be read as integers.
    #[serde(default)]
    pub unreadable_valid: Vec<String>,
    /// `invalid_results` entries that could not be read as integers.
    #[serde(default)]
    pub unreadable_invalid: Vec<String>,
    /// Whether to keep searching.
    pub decision: Verdict,
}

/// One entry of the audit trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", content = "details", rename_all = "lowercase")]
pub enum TraceStep {
    /// A search call.
    Retrieve {
        /// The user's question.
        user_query: String,
        /// Query sent to the index.
        generated_search_query: String,
        /// Collection restriction, if any.
        scope_filter: Option<String>,
        /// Items returned.
        results_summary: Vec<EvidenceRef>,
        /// Failure text when the search failed.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    /// A completed review.
    Review {
        /// Reviewer rationale.
        review_thought_process: String,
        /// Items moved to vetted.
        valid_results: Vec<EvidenceRef>,
        /// Items moved to discarded by verdict.
        invalid_results: Vec<EvidenceRef>,
        /// Items the reviewer left unjudged, moved to discarded.
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        unclassified: Vec<EvidenceRef>,
        /// Out-of-range indices that were ignored.
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        dropped_indices: Vec<i64>,
        /// Non-integer entries that were ignored, as raw JSON text.
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        unreadable_indices: Vec<String>,
        /// The verdict.
        decision: Verdict,
    },
    /// The final answer.
    Response {
        /// Answer text.
        final_answer: String,
    },
}

/// Counts produced by [`Conversation::apply_review`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReviewOutcome {
    /// Items moved to vetted.
    pub vetted: usize,
    /// Items moved to discarded (judged invalid or unclassified).
    pub discarded: usize,
    /// Out-of-range or unreadable indices dropped.
    pub dropped: usize,
}

/// Input for one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationRequest {
    /// The user's question.
    pub user_query: String,
    /// Restrict retrieval to one document collection.
    pub scope_filter: Option<String>,
    /// Session to attach history to; generated when absent.
    pub session_id: Option<String>,
    /// Caller identity recorded with chat history.
    pub user_id: Option<String>,
    /// Override of the configured attempt bound.
    pub max_attempts: Option<usize>,
}

impl ConversationRequest {
    /// Creates a request for a question with no scope or session.
    #[must_use]
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Self::default()
        }
    }

    /// Restricts retrieval to one document collection.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope_filter = Some(scope.into());
        self
    }

    /// Attaches the conversation to an existing session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Overrides the attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// State for one question, owned by the loop controller.
#[derive(Debug, Clone)]
pub struct Conversation {
    session_id: String,
    user_id: Option<String>,
    user_query: String,
    scope_filter: Option<String>,
    max_attempts: usize,
    attempts: usize,
    search_history: Vec<String>,
    current_results: Vec<EvidenceItem>,
    vetted_results: Vec<EvidenceItem>,
    discarded_results: Vec<EvidenceItem>,
    processed_ids: HashSet<String>,
    reviews: Vec<String>,
    decisions: Vec<Verdict>,
    thought_process: Vec<TraceStep>,
    warnings: Vec<IndexValidationWarning>,
    usage: TokenUsage,
}

impl Conversation {
    /// Creates a conversation with the default attempt bound and a fresh session.
    #[must_use]
    pub fn new(user_query: impl Into<String>, scope_filter: Option<String>) -> Self {
        Self::from_request(
            ConversationRequest {
                user_query: user_query.into(),
                scope_filter,
                ..ConversationRequest::default()
            },
            DEFAULT_MAX_ATTEMPTS,
        )
    }

    /// Creates a conversation from a request, using `default_max_attempts`
    /// unless the request overrides it.
    #[must_use]
    pub fn from_request(request: ConversationRequest, default_max_attempts: usize) -> Self {
        Self {
            session_id: request
                .session_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            user_id: request.user_id,
            user_query: request.user_query,
            scope_filter: request.scope_filter,
            max_attempts: request.max_attempts.unwrap_or(default_max_attempts),
            attempts: 0,
            search_history: Vec::new(),
            current_results: Vec::new(),
            vetted_results: Vec::new(),
            discarded_results: Vec::new(),
            processed_ids: HashSet::new(),
            reviews: Vec::new(),
            decisions: Vec::new(),
            thought_process: Vec::new(),
            warnings: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Caller identity, if known.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// The user's question.
    #[must_use]
    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    /// Collection restriction, if any.
    #[must_use]
    pub fn scope_filter(&self) -> Option<&str> {
        self.scope_filter.as_deref()
    }

    /// Attempt bound.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Completed query generations.
    #[must_use]
    pub const fn attempts(&self) -> usize {
        self.attempts
    }

    /// Issued queries, oldest first.
    #[must_use]
    pub fn search_history(&self) -> &[String] {
        &self.search_history
    }

    /// The batch awaiting review.
    #[must_use]
    pub fn current_results(&self) -> &[EvidenceItem] {
        &self.current_results
    }

    /// Evidence judged usable.
    #[must_use]
    pub fn vetted_results(&self) -> &[EvidenceItem] {
        &self.vetted_results
    }

    /// Evidence judged unusable.
    #[must_use]
    pub fn discarded_results(&self) -> &[EvidenceItem] {
        &self.discarded_results
    }

    /// Ids of every vetted or discarded item.
    #[must_use]
    pub const fn processed_ids(&self) -> &HashSet<String> {
        &self.processed_ids
    }

    /// Reviewer rationales, one per completed review.
    #[must_use]
    pub fn reviews(&self) -> &[String] {
        &self.reviews
    }

    /// Reviewer verdicts, one per completed review.
    #[must_use]
    pub fn decisions(&self) -> &[Verdict] {
        &self.decisions
    }

    /// Audit trace.
    #[must_use]
    pub fn thought_process(&self) -> &[TraceStep] {
        &self.thought_process
    }

    /// Index validation warnings recorded so far.
    #[must_use]
    pub fn warnings(&self) -> &[IndexValidationWarning] {
        &self.warnings
    }

    /// Tokens consumed by model calls so far.
    #[must_use]
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Adds one model call's token usage.
    pub const fn add_usage(&mut self, usage: TokenUsage) {
        self.usage = self.usage.saturating_add(usage);
    }

    /// `true` while attempts remain and no review has ever said finalize.
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.attempts < self.max_attempts && !self.decisions.iter().any(|d| d.is_final())
    }

    /// Current loop state derived from [`Self::should_continue`].
    #[must_use]
    pub fn state(&self) -> LoopState {
        if self.should_continue() {
            LoopState::Searching
        } else {
            LoopState::Finalizing
        }
    }

    /// Records an issued query. Called exactly once per query generation.
    pub fn record_search_attempt(&mut self, query: impl Into<String>) {
        self.search_history.push(query.into());
        self.attempts += 1;
    }

    /// Replaces the batch awaiting review.
    ///
    /// Items already processed, and repeated ids within the batch, are
    /// dropped so no id is reviewed twice.
    pub fn set_current_results(&mut self, items: Vec<EvidenceItem>) {
        let mut seen = HashSet::new();
        self.current_results = items
            .into_iter()
            .filter(|item| !self.processed_ids.contains(&item.id) && seen.insert(item.id.clone()))
            .collect();
    }

    /// Keeps at most `len` items of the batch awaiting review.
    pub fn truncate_current_results(&mut self, len: usize) {
        self.current_results.truncate(len);
    }

    /// Clears the batch awaiting review without judging it.
    pub fn clear_current_results(&mut self) {
        self.current_results.clear();
    }

    /// Appends an audit trace entry.
    pub fn record_trace(&mut self, step: TraceStep) {
        self.thought_process.push(step);
    }

    /// Applies a reviewer judgment to the current batch.
    ///
    /// Out-of-range and unreadable indices in either list are dropped and
    /// recorded as [`IndexValidationWarning`]s. Duplicates are applied once; an index
    /// in both lists counts as valid. In-range items in neither list are
    /// discarded as unclassified. The batch is cleared afterwards.
    pub fn apply_review(&mut self, review: ReviewDecision) -> ReviewOutcome {
        let count = self.current_results.len();
        let attempt = self.attempts;

        let (valid, dropped_valid) = partition_indices(&review.valid_results, count);
        let (mut invalid, dropped_invalid) = partition_indices(&review.invalid_results, count);
        invalid.retain(|idx| !valid.contains(idx));
        let unclassified: BTreeSet<usize> = (0..count)
            .filter(|idx| !valid.contains(idx) && !invalid.contains(idx))
            .collect();

        for (bucket, dropped, unreadable) in [
            (IndexBucket::Valid, &dropped_valid, &review.unreadable_valid),
            (IndexBucket::Invalid, &dropped_invalid, &review.unreadable_invalid),
        ] {
            if dropped.is_empty() && unreadable.is_empty() {
                continue;
            }
            warn!(
                attempt,
                ?bucket,
                dropped = ?dropped,
                unreadable = ?unreadable,
                result_count = count,
                "reviewer returned unusable indices"
            );
            self.warnings.push(IndexValidationWarning {
                attempt,
                bucket,
                dropped: dropped.clone(),
                unreadable: unreadable.clone(),
                result_count: count,
            });
        }

        self.reviews.push(review.thought_process.clone());
        self.decisions.push(review.decision);

        let batch = std::mem::take(&mut self.current_results);
        let pick = |indices: &BTreeSet<usize>| -> Vec<EvidenceItem> {
            indices.iter().map(|&idx| batch[idx].clone()).collect()
        };
        let valid_items = pick(&valid);
        let invalid_items = pick(&invalid);
        let unclassified_items = pick(&unclassified);

        let refs = |items: &[EvidenceItem]| -> Vec<EvidenceRef> { items.iter().map(EvidenceItem::summary).collect() };
        let trace = TraceStep::Review {
            review_thought_process: review.thought_process,
            valid_results: refs(&valid_items),
            invalid_results: refs(&invalid_items),
            unclassified: refs(&unclassified_items),
            dropped_indices: dropped_valid.iter().chain(&dropped_invalid).copied().collect(),
            unreadable_indices: review
                .unreadable_valid
                .iter()
                .chain(&review.unreadable_invalid)
                .cloned()
                .collect(),
            decision: review.decision,
        };

        let mut outcome = ReviewOutcome {
            dropped: dropped_valid.len()
                + dropped_invalid.len()
                + review.unreadable_valid.len()
                + review.unreadable_invalid.len(),
            ..ReviewOutcome::default()
        };
        for item in valid_items {
            if self.processed_ids.insert(item.id.clone()) {
                self.vetted_results.push(item);
                outcome.vetted += 1;
            }
        }
        for item in invalid_items.into_iter().chain(unclassified_items) {
            if self.processed_ids.insert(item.id.clone()) {
                self.discarded_results.push(item);
                outcome.discarded += 1;
            }
        }

        self.thought_process.push(trace);
        outcome
    }

    /// Consumes the conversation into its caller-facing result.
    #[must_use]
    pub fn into_result(self, final_answer: String) -> ConversationResult {
        ConversationResult {
            session_id: self.session_id,
            final_answer,
            citations: self.vetted_results,
            discarded_count: self.discarded_results.len(),
            thought_process: self.thought_process,
            attempts: self.attempts,
            search_queries: self.search_history,
            warnings: self.warnings,
            usage: self.usage,
        }
    }
}

/// Splits raw model indices into in-range positions and dropped values.
fn partition_indices(raw: &[i64], count: usize) -> (BTreeSet<usize>, Vec<i64>) {
    let mut in_range = BTreeSet::new();
    let mut dropped = Vec::new();
    for &idx in raw {
        match usize::try_from(idx) {
            Ok(i) if i < count => {
                in_range.insert(i);
            }
            _ => dropped.push(idx),
        }
    }
    (in_range, dropped)
}

/// What a conversation returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResult {
    /// Session the conversation belonged to.
    pub session_id: String,
    /// Answer text with inline citations.
    pub final_answer: String,
    /// Vetted evidence.
    pub citations: Vec<EvidenceItem>,
    /// Number of discarded items.
    pub discarded_count: usize,
    /// Audit trace.
    pub thought_process: Vec<TraceStep>,
    /// Query generations performed.
    pub attempts: usize,
    /// Issued queries, oldest first.
    pub search_queries: Vec<String>,
    /// Index validation warnings.
    #[serde(default)]
    pub warnings: Vec<IndexValidationWarning>,
    /// Tokens consumed across all model calls.
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ConversationResult {
    /// Ids of vetted items the answer actually cites, in citation order
    /// without repeats. Citations naming unknown ids are ignored.
    #[must_use]
    pub fn cited_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        parse_citations(&self.final_answer)
            .into_iter()
            .filter(|c| {
                self.citations
                    .iter()
                    .any(|item| item.id == c.id && item.source == c.source)
            })
            .filter(|c| seen.insert(c.id.clone()))
            .map(|c| c.id)
            .collect()
    }
}
