//! Result reviewer agent.
//!
//! Judges the current batch of search results against the question and
//! returns a [`ReviewDecision`]: which indices are useful, which are not,
//! and whether to search again. The model's indices are untrusted;
//! [`Conversation::apply_review`] bounds-checks them before any state
//! changes.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::config::AgentConfig;
use super::conversation::{Conversation, ReviewDecision, ReviewOutcome};
use super::prompt::{build_review_prompt, strip_code_fences, truncate_chars};
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Verdict;
use crate::error::AgentError;

/// Longest rationale kept, in characters.
const MAX_RATIONALE_CHARS: usize = 8_000;

/// Most indices read from either list.
const MAX_INDICES: usize = 100;

/// Wire shape of a review, before validation.
#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(alias = "rationale", default)]
    thought_process: String,
    #[serde(default)]
    valid_results: Vec<serde_json::Value>,
    #[serde(default)]
    invalid_results: Vec<serde_json::Value>,
    decision: String,
}

/// Agent that judges search results.
pub struct ResultReviewer {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl ResultReviewer {
    /// Creates a new reviewer with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.review_model.clone(),
            max_tokens: config.review_max_tokens,
            system_prompt,
        }
    }

    /// Reviews the conversation's current batch and applies the verdict.
    ///
    /// Returns `None` without touching reviews or decisions when there was
    /// nothing to review or the review failed. A failed review still clears
    /// the batch.
    pub async fn review(
        &self,
        provider: &dyn LlmProvider,
        conversation: &mut Conversation,
    ) -> Option<ReviewOutcome> {
        let attempt = conversation.attempts();
        if conversation.current_results().is_empty() {
            debug!(attempt, "no candidates to review");
            return None;
        }

        let prompt = build_review_prompt(
            conversation.user_query(),
            conversation.current_results(),
            conversation.vetted_results(),
            conversation.search_history(),
            conversation.reviews(),
        );

        match self.request_review(provider, &prompt, conversation).await {
            Ok(decision) => {
                let verdict = decision.decision;
                let outcome = conversation.apply_review(decision);
                info!(
                    attempt,
                    decision = %verdict,
                    vetted = outcome.vetted,
                    discarded = outcome.discarded,
                    dropped = outcome.dropped,
                    "review applied"
                );
                Some(outcome)
            }
            Err(e) => {
                warn!(attempt, error = %e, "review failed, discarding batch without a verdict");
                conversation.clear_current_results();
                None
            }
        }
    }

    async fn request_review(
        &self,
        provider: &dyn LlmProvider,
        prompt: &str,
        conversation: &mut Conversation,
    ) -> Result<ReviewDecision, AgentError> {
        let response = self.execute(provider, prompt).await?;
        conversation.add_usage(response.usage);
        let truncated = response
            .finish_reason
            .as_deref()
            .is_some_and(|r| r == "length");
        match Self::parse_decision(&response.content) {
            Ok(decision) => Ok(decision),
            Err(_) if truncated => Err(AgentError::ResponseParse {
                message: format!(
                    "Response truncated (finish_reason=length, max_tokens={}). \
                     Consider raising the review token limit.",
                    self.max_tokens
                ),
                content: response.content,
            }),
            Err(e) => Err(e),
        }
    }

    /// Parses a review response.
    ///
    /// Indices may arrive as integers, integral floats or numeric strings.
    /// Anything else is kept as raw text so it surfaces as a validation
    /// warning. Range checking happens later, against the actual batch.
    fn parse_decision(content: &str) -> Result<ReviewDecision, AgentError> {
        let body = strip_code_fences(content);
        let raw: RawReview = serde_json::from_str(body).map_err(|e| AgentError::ResponseParse {
            message: format!("Failed to parse review decision: {e}"),
            content: content.to_string(),
        })?;

        let decision = Verdict::parse(&raw.decision).ok_or_else(|| AgentError::ResponseParse {
            message: format!("unknown review decision '{}'", raw.decision),
            content: content.to_string(),
        })?;

        let mut thought_process = raw.thought_process;
        truncate_chars(&mut thought_process, MAX_RATIONALE_CHARS);

        let (valid_results, unreadable_valid) = index_list(&raw.valid_results);
        let (invalid_results, unreadable_invalid) = index_list(&raw.invalid_results);
        Ok(ReviewDecision {
            thought_process,
            valid_results,
            invalid_results,
            unreadable_valid,
            unreadable_invalid,
            decision,
        })
    }
}

/// Splits raw index entries into readable integers and everything else.
fn index_list(values: &[serde_json::Value]) -> (Vec<i64>, Vec<String>) {
    let mut indices = Vec::new();
    let mut unreadable = Vec::new();
    for value in values.iter().take(MAX_INDICES) {
        match read_index(value) {
            Some(idx) => indices.push(idx),
            None => unreadable.push(value.to_string()),
        }
    }
    (indices, unreadable)
}

/// Largest float magnitude that still converts to an exact integer.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation)]
fn read_index(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl Agent for ResultReviewer {
    fn name(&self) -> &'static str {
        "reviewer"
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

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::mock::{REVIEW_MODEL, ScriptedProvider, items, test_config};
    use crate::agent::prompt::REVIEW_SYSTEM_PROMPT;
    use test_case::test_case;

    fn agent() -> ResultReviewer {
        ResultReviewer::new(&test_config(), REVIEW_SYSTEM_PROMPT.to_string())
    }

    fn conversation_with(ids: &[&str]) -> Conversation {
        let mut conv = Conversation::new("What certifications are required?", None);
        conv.record_search_attempt("certifications");
        conv.set_current_results(items(ids));
        conv
    }

    #[test]
    fn test_parse_decision() {
        let content = r#"{"thought_process": "two useful", "valid_results": [0, 2], "invalid_results": [1], "decision": "retry"}"#;
        let decision = ResultReviewer::parse_decision(content).unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.valid_results, vec![0, 2]);
        assert_eq!(decision.invalid_results, vec![1]);
        assert_eq!(decision.decision, Verdict::Retry);
    }

    #[test]
    fn test_parse_decision_lenient_shapes() {
        let content = "```json\n{\"rationale\": \"ok\", \"valid_results\": [\"1\", 3.5, null, -2], \"decision\": \"Finalize\"}\n```";
        let decision = ResultReviewer::parse_decision(content).unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.thought_process, "ok");
        assert_eq!(decision.valid_results, vec![1, -2]);
        assert_eq!(decision.unreadable_valid, vec!["3.5".to_string(), "null".to_string()]);
        assert!(decision.invalid_results.is_empty());
        assert_eq!(decision.decision, Verdict::Finalize);
    }

    #[test_case(r#"[0, 9223372036854775808, 1.0]"#, &[0, 1], &["9223372036854775808"] ; "oversized integer kept for warning, integral float read")]
    #[test_case(r#"[2.0, "3", -1.0]"#, &[2, 3, -1], &[] ; "integral floats and numeric strings")]
    #[test_case(r#"[1.5, "two", true, [0]]"#, &[], &["1.5", "\"two\"", "true", "[0]"] ; "non integers kept verbatim")]
    fn test_parse_decision_index_entries(raw: &str, indices: &[i64], unreadable: &[&str]) {
        let content = format!(r#"{{"thought_process": "", "valid_results": {raw}, "decision": "retry"}}"#);
        let decision = ResultReviewer::parse_decision(&content).unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.valid_results, indices);
        assert_eq!(decision.unreadable_valid, unreadable);
    }

    #[tokio::test]
    async fn test_review_unreadable_indices_are_warned() {
        let provider = ScriptedProvider::new().ok(
            REVIEW_MODEL,
            r#"{"thought_process": "both", "valid_results": [0, 9223372036854775808, 1.0], "invalid_results": [], "decision": "finalize"}"#,
        );
        let mut conv = conversation_with(&["a", "b"]);

        let outcome = agent().review(&provider, &mut conv).await;

        assert_eq!(
            outcome,
            Some(ReviewOutcome {
                vetted: 2,
                discarded: 0,
                dropped: 1
            })
        );
        assert!(conv.discarded_results().is_empty());
        assert_eq!(conv.warnings().len(), 1);
        assert!(conv.warnings()[0].dropped.is_empty());
        assert_eq!(conv.warnings()[0].unreadable, vec!["9223372036854775808".to_string()]);
    }

    #[test]
    fn test_parse_decision_rejects_unknown_verdict() {
        let content = r#"{"thought_process": "", "decision": "maybe"}"#;
        assert!(matches!(
            ResultReviewer::parse_decision(content),
            Err(AgentError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_parse_decision_caps_lists_and_rationale() {
        let indices: Vec<usize> = (0..500).collect();
        let content = serde_json::json!({
            "thought_process": "x".repeat(20_000),
            "valid_results": indices,
            "decision": "retry",
        })
        .to_string();
        let decision = ResultReviewer::parse_decision(&content).unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.valid_results.len(), MAX_INDICES);
        assert_eq!(decision.thought_process.chars().count(), MAX_RATIONALE_CHARS);
    }

    #[tokio::test]
    async fn test_review_applies_decision() {
        let provider = ScriptedProvider::new().ok(
            REVIEW_MODEL,
            r#"{"thought_process": "a and c help", "valid_results": [0, 2], "invalid_results": [1], "decision": "retry"}"#,
        );
        let mut conv = conversation_with(&["a", "b", "c"]);

        let outcome = agent().review(&provider, &mut conv).await;

        assert_eq!(
            outcome,
            Some(ReviewOutcome {
                vetted: 2,
                discarded: 1,
                dropped: 0
            })
        );
        assert_eq!(conv.reviews(), ["a and c help".to_string()]);
        assert_eq!(conv.decisions(), [Verdict::Retry]);
        assert!(conv.current_results().is_empty());

        let request = &provider.requests()[0];
        assert!(request.json_mode);
        assert!(request.messages[1].content.contains(r#"<result index="2" id="c""#));
    }

    #[tokio::test]
    async fn test_review_out_of_range_indices() {
        let provider = ScriptedProvider::new().ok(
            REVIEW_MODEL,
            r#"{"thought_process": "all good", "valid_results": [0, 1, 2, 7], "invalid_results": [], "decision": "finalize"}"#,
        );
        let mut conv = conversation_with(&["a", "b"]);

        let outcome = agent().review(&provider, &mut conv).await;

        assert_eq!(outcome.map(|o| o.dropped), Some(2));
        assert_eq!(conv.vetted_results().len(), 2);
        assert_eq!(conv.warnings()[0].dropped, vec![2, 7]);
    }

    #[tokio::test]
    async fn test_review_skipped_without_candidates() {
        let provider = ScriptedProvider::new();
        let mut conv = conversation_with(&[]);

        let outcome = agent().review(&provider, &mut conv).await;

        assert!(outcome.is_none());
        assert!(provider.requests().is_empty());
        assert!(conv.reviews().is_empty());
    }

    #[tokio::test]
    async fn test_review_failure_leaves_verdicts_unchanged() {
        let provider = ScriptedProvider::new().err(REVIEW_MODEL, "service unavailable");
        let mut conv = conversation_with(&["a", "b"]);

        let outcome = agent().review(&provider, &mut conv).await;

        assert!(outcome.is_none());
        assert!(conv.reviews().is_empty());
        assert!(conv.decisions().is_empty());
        assert!(conv.vetted_results().is_empty());
        assert!(conv.discarded_results().is_empty());
        assert!(conv.current_results().is_empty());
    }

    #[tokio::test]
    async fn test_review_unparseable_response_is_a_failure() {
        let provider = ScriptedProvider::new().ok(REVIEW_MODEL, "These all look relevant to me.");
        let mut conv = conversation_with(&["a"]);

        assert!(agent().review(&provider, &mut conv).await.is_none());
        assert!(conv.decisions().is_empty());
    }
}
