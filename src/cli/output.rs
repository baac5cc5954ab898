//! Output formatting for CLI commands.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::agent::ConversationResult;
use crate::core::EvidenceItem;
use crate::error::CommandError;

/// Longest passage preview printed by `search`, in characters.
const PREVIEW_CHARS: usize = 160;

/// Output format for commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognised is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes a value as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::OutputFormat`] if serialization fails.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> Result<String, CommandError> {
        let mut out = serde_json::to_string_pretty(value)
            .map_err(|e| CommandError::OutputFormat(format!("JSON serialization failed: {e}")))?;
        out.push('\n');
        Ok(out)
    }
}

/// Formats a conversation result.
///
/// Text output is the answer followed by a footer listing run statistics
/// and the vetted sources, marking the ones the answer cites.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON rendering fails.
pub fn format_answer(
    result: &ConversationResult,
    format: OutputFormat,
    verbose: bool,
) -> Result<String, CommandError> {
    if format == OutputFormat::Json {
        return format.to_json(result);
    }

    let mut out = result.final_answer.trim_end().to_string();
    let _ = write!(
        out,
        "\n\n---\nAttempts: {} | Vetted: {} | Discarded: {} | Tokens: {}",
        result.attempts,
        result.citations.len(),
        result.discarded_count,
        result.usage.total_tokens
    );

    if !result.citations.is_empty() {
        let cited: HashSet<String> = result.cited_ids().into_iter().collect();
        out.push_str("\nSources:");
        for item in &result.citations {
            let marker = if cited.contains(&item.id) { '*' } else { ' ' };
            let _ = write!(out, "\n {marker} [{}] {}", item.id, item.source);
            if let Some(file) = &item.file_name {
                let _ = write!(out, " ({file})");
            }
        }
    }

    for warning in &result.warnings {
        let _ = write!(
            out,
            "\nWarning: attempt {} dropped {:?} index(es) {:?} (batch of {})",
            warning.attempt, warning.bucket, warning.dropped, warning.result_count
        );
        if !warning.unreadable.is_empty() {
            let _ = write!(out, ", unreadable {}", warning.unreadable.join(", "));
        }
    }

    if verbose {
        out.push_str("\nQueries:");
        for (i, query) in result.search_queries.iter().enumerate() {
            let _ = write!(out, "\n  {}. {query}", i + 1);
        }
        let _ = write!(out, "\nSession: {}", result.session_id);
    }

    out.push('\n');
    Ok(out)
}

/// Formats the hits of a single search.
///
/// # Errors
///
/// Returns [`CommandError::OutputFormat`] if JSON rendering fails.
pub fn format_search_results(
    query: &str,
    items: &[EvidenceItem],
    format: OutputFormat,
) -> Result<String, CommandError> {
    if format == OutputFormat::Json {
        return format.to_json(&serde_json::json!({
            "query": query,
            "count": items.len(),
            "results": items,
        }));
    }

    if items.is_empty() {
        return Ok(format!("No results for: {query}\n"));
    }

    let mut out = format!("{} result(s) for: {query}\n", items.len());
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "\n{}. [{}] {} (score {:.3})", i + 1, item.id, item.source, item.score);
        if let Some(file) = &item.file_name {
            let _ = writeln!(out, "   file: {file}");
        }
        let _ = writeln!(out, "   {}", preview(&item.content));
    }
    Ok(out)
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Conversation, ReviewDecision};
    use crate::core::Verdict;

    fn result(answer: &str) -> ConversationResult {
        let mut conv = Conversation::new("What is due?", None);
        conv.record_search_attempt("due date");
        conv.set_current_results(vec![
            EvidenceItem::new("c-1", "City Transit", "Bids close 15 June.").with_file_name("rfp.pdf"),
            EvidenceItem::new("c-2", "City Transit", "Questions due 1 June."),
        ]);
        conv.apply_review(ReviewDecision {
            thought_process: String::new(),
            valid_results: vec![0, 1],
            invalid_results: Vec::new(),
            unreadable_valid: Vec::new(),
            unreadable_invalid: Vec::new(),
            decision: Verdict::Finalize,
        });
        conv.into_result(answer.to_string())
    }

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("yaml"), OutputFormat::Text);
    }

    #[test]
    fn test_format_answer_text_marks_cited_sources() {
        let out = format_answer(
            &result("Bids close 15 June <cit>City Transit - c-1</cit>."),
            OutputFormat::Text,
            false,
        )
        .unwrap_or_else(|_| unreachable!());
        assert!(out.starts_with("Bids close 15 June"));
        assert!(out.contains("Attempts: 1 | Vetted: 2 | Discarded: 0"));
        assert!(out.contains(" * [c-1] City Transit (rfp.pdf)"));
        assert!(out.contains("   [c-2] City Transit"));
        assert!(!out.contains("Session:"));
    }

    #[test]
    fn test_format_answer_json() {
        let out = format_answer(&result("answer"), OutputFormat::Json, false)
            .unwrap_or_else(|_| unreachable!());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value["final_answer"], "answer");
        assert_eq!(value["attempts"], 1);
        assert_eq!(value["citations"][0]["id"], "c-1");
        assert_eq!(value["search_queries"][0], "due date");
    }

    #[test]
    fn test_format_search_results() {
        let items = vec![EvidenceItem::new("c-9", "Health", "x ".repeat(200)).with_score(1.5)];
        let out = format_search_results("bonds", &items, OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.starts_with("1 result(s) for: bonds"));
        assert!(out.contains("[c-9] Health (score 1.500)"));
        assert!(out.contains("..."));

        let empty = format_search_results("bonds", &[], OutputFormat::Text)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(empty, "No results for: bonds\n");
    }
}
