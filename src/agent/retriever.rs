//! Retrieval step of the search loop.

use tracing::{debug, warn};

use super::conversation::{Conversation, TraceStep};
use crate::core::EvidenceItem;
use crate::search::{DEFAULT_TOP_K, SearchIndex, SearchRequest};

/// Runs one search against a [`SearchIndex`] on behalf of a conversation.
///
/// The index is asked to exclude processed ids and the result is filtered
/// again locally, so an index that ignores the exclusion cannot reintroduce
/// evidence that was already judged.
#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    top_k: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl Retriever {
    /// Creates a retriever returning at most `top_k` items per search.
    #[must_use]
    pub const fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Items requested per search.
    #[must_use]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Searches for `query` and stores the hits as the conversation's
    /// current batch. Returns the batch size.
    ///
    /// A failed search yields an empty batch; the failure is logged and
    /// recorded in the trace.
    pub async fn retrieve(
        &self,
        index: &dyn SearchIndex,
        conversation: &mut Conversation,
        query: &str,
    ) -> usize {
        let outcome = {
            let request = SearchRequest {
                query,
                exclude_ids: conversation.processed_ids(),
                scope: conversation.scope_filter(),
                top_k: self.top_k,
            };
            index.search(&request).await
        };

        let (items, error) = match outcome {
            Ok(items) => (items, None),
            Err(e) => {
                warn!(index = index.name(), error = %e, "search failed, continuing with no results");
                (Vec::new(), Some(e.to_string()))
            }
        };

        conversation.set_current_results(items);
        conversation.truncate_current_results(self.top_k);
        let summary: Vec<_> = conversation
            .current_results()
            .iter()
            .map(EvidenceItem::summary)
            .collect();

        debug!(
            attempt = conversation.attempts(),
            results = summary.len(),
            excluded = conversation.processed_ids().len(),
            "retrieved candidates"
        );

        conversation.record_trace(TraceStep::Retrieve {
            user_query: conversation.user_query().to_string(),
            generated_search_query: query.to_string(),
            scope_filter: conversation.scope_filter().map(str::to_string),
            results_summary: summary,
            error,
        });

        conversation.current_results().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::ReviewDecision;
    use crate::agent::mock::{ScriptedIndex, items};
    use crate::core::Verdict;

    #[tokio::test]
    async fn test_retrieve_sets_current_and_traces() {
        let index = ScriptedIndex::new().batch(items(&["a", "b", "c"]));
        let mut conv = Conversation::new("q", Some("City Transit".to_string()));
        conv.record_search_attempt("certifications");

        let count = Retriever::default().retrieve(&index, &mut conv, "certifications").await;

        assert_eq!(count, 3);
        assert_eq!(conv.current_results().len(), 3);
        let Some(TraceStep::Retrieve {
            generated_search_query,
            scope_filter,
            results_summary,
            error,
            ..
        }) = conv.thought_process().last()
        else {
            unreachable!()
        };
        assert_eq!(generated_search_query, "certifications");
        assert_eq!(scope_filter.as_deref(), Some("City Transit"));
        assert_eq!(results_summary.len(), 3);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_failure_yields_empty_batch() {
        let index = ScriptedIndex::new().failure("connection reset");
        let mut conv = Conversation::new("q", None);
        conv.record_search_attempt("q");

        let count = Retriever::default().retrieve(&index, &mut conv, "q").await;

        assert_eq!(count, 0);
        assert!(conv.current_results().is_empty());
        assert!(matches!(
            conv.thought_process().last(),
            Some(TraceStep::Retrieve { error: Some(e), .. }) if e.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_retrieve_excludes_processed_even_if_index_returns_them() {
        let index = ScriptedIndex::new()
            .batch(items(&["a", "b"]))
            .batch(items(&["a", "c"]));
        let retriever = Retriever::default();
        let mut conv = Conversation::new("q", None);

        conv.record_search_attempt("q1");
        retriever.retrieve(&index, &mut conv, "q1").await;
        conv.apply_review(ReviewDecision {
            thought_process: String::new(),
            valid_results: vec![0],
            invalid_results: vec![1],
            unreadable_valid: Vec::new(),
            unreadable_invalid: Vec::new(),
            decision: Verdict::Retry,
        });

        conv.record_search_attempt("q2");
        let count = retriever.retrieve(&index, &mut conv, "q2").await;

        assert_eq!(count, 1);
        assert_eq!(conv.current_results()[0].id, "c");
        let excluded = index.excluded();
        assert!(excluded[0].is_empty());
        assert!(excluded[1].contains("a") && excluded[1].contains("b"));
    }

    #[tokio::test]
    async fn test_retrieve_truncates_to_top_k() {
        let index = ScriptedIndex::new().batch(items(&["a", "b", "c", "d"]));
        let mut conv = Conversation::new("q", None);
        conv.record_search_attempt("q");

        let count = Retriever::new(2).retrieve(&index, &mut conv, "q").await;

        assert_eq!(count, 2);
        assert_eq!(conv.current_results()[1].id, "b");
    }
}
