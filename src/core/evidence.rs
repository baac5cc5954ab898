//! Retrieved evidence items.

use serde::{Deserialize, Serialize};

/// One retrieved passage with its source metadata.
///
/// Identity is [`id`](Self::id). Items are never mutated once retrieved;
/// they only move between the conversation's result buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Index-assigned chunk identifier.
    #[serde(alias = "chunk_id")]
    pub id: String,
    /// Passage text.
    #[serde(alias = "chunk_content")]
    pub content: String,
    /// Name of the document collection (pursuit) the passage belongs to.
    #[serde(alias = "pursuit_name")]
    pub source: String,
    /// Original uploaded file name, when the index records it.
    #[serde(default, alias = "source_file", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Page numbers the passage spans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<u32>,
    /// Relevance score assigned by the index for the query that found it.
    #[serde(default)]
    pub score: f64,
}

impl EvidenceItem {
    /// Creates an item with no file name, pages or score.
    #[must_use]
    pub fn new(id: impl Into<String>, source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            source: source.into(),
            file_name: None,
            pages: Vec::new(),
            score: 0.0,
        }
    }

    /// Sets the source file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Sets the index score.
    #[must_use]
    pub const fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Short identity used in traces and logs.
    #[must_use]
    pub fn summary(&self) -> EvidenceRef {
        EvidenceRef {
            id: self.id.clone(),
            source: self.source.clone(),
            file_name: self.file_name.clone(),
        }
    }
}

/// Identity of an evidence item without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Chunk identifier.
    pub id: String,
    /// Document collection name.
    pub source: String,
    /// Source file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_index_field_names() {
        let json = r#"{
            "chunk_id": "c-1",
            "chunk_content": "Vendors must hold ISO 27001.",
            "pursuit_name": "Ministry of Health",
            "source_file": "rfp.pdf",
            "pages": [3, 4],
            "score": 2.5
        }"#;
        let item: EvidenceItem = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert_eq!(item.id, "c-1");
        assert_eq!(item.source, "Ministry of Health");
        assert_eq!(item.file_name.as_deref(), Some("rfp.pdf"));
        assert_eq!(item.pages, vec![3, 4]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{"id": "c-2", "content": "text", "source": "p"}"#;
        let item: EvidenceItem = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        assert!(item.file_name.is_none());
        assert!(item.pages.is_empty());
        assert!(item.score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_drops_content() {
        let item = EvidenceItem::new("c-3", "p", "long content").with_file_name("a.pdf");
        let summary = item.summary();
        assert_eq!(summary.id, "c-3");
        assert_eq!(summary.file_name.as_deref(), Some("a.pdf"));
        let json = serde_json::to_string(&summary).unwrap_or_default();
        assert!(!json.contains("long content"));
    }
}
