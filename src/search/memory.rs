//! In-process keyword index over a JSON corpus.
//!
//! Scores passages by IDF-weighted term overlap with the query. Good
//! enough for local runs and tests; production deployments point the
//! retriever at a hosted index instead.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use super::{SearchIndex, SearchRequest};
use crate::core::EvidenceItem;
use crate::error::RetrievalError;

/// Keyword index held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    items: Vec<EvidenceItem>,
    terms: Vec<HashMap<String, usize>>,
    document_frequency: HashMap<String, usize>,
}

impl MemoryIndex {
    /// Builds an index from evidence items.
    #[must_use]
    pub fn new(items: Vec<EvidenceItem>) -> Self {
        let terms: Vec<HashMap<String, usize>> =
            items.iter().map(|item| term_counts(&item.content)).collect();

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        for counts in &terms {
            for term in counts.keys() {
                *document_frequency.entry(term.clone()).or_default() += 1;
            }
        }

        Self {
            items,
            terms,
            document_frequency,
        }
    }

    /// Loads a corpus file containing a JSON array of evidence items.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Corpus`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RetrievalError> {
        let corpus_error = |message: String| RetrievalError::Corpus {
            path: path.display().to_string(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| corpus_error(e.to_string()))?;
        let items: Vec<EvidenceItem> =
            serde_json::from_str(&raw).map_err(|e| corpus_error(e.to_string()))?;

        let mut seen = HashSet::new();
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.id.as_str())) {
            return Err(corpus_error(format!("duplicate chunk id '{}'", dup.id)));
        }

        Ok(Self::new(items))
    }

    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the index holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, query_terms: &HashSet<String>, doc: usize) -> f64 {
        let n = self.items.len() as f64;
        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *self.terms[doc].get(term)?;
                let df = self.document_frequency.get(term).copied().unwrap_or(1) as f64;
                let idf = (1.0 + n / df).ln();
                Some((1.0 + (tf as f64).ln()) * idf)
            })
            .sum()
    }
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for word in text.unicode_words() {
        *counts.entry(word.to_lowercase()).or_default() += 1;
    }
    counts
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let query_terms: HashSet<String> = term_counts(request.query).into_keys().collect();

        let mut scored: Vec<(f64, usize)> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !request.exclude_ids.contains(&item.id))
            .filter(|(_, item)| request.scope.is_none_or(|scope| item.source == scope))
            .map(|(idx, _)| (self.score(&query_terms, idx), idx))
            .filter(|(score, _)| *score > 0.0)
            .collect();

        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| self.items[a.1].id.cmp(&self.items[b.1].id))
        });

        Ok(scored
            .into_iter()
            .take(request.top_k)
            .map(|(score, idx)| self.items[idx].clone().with_score(score))
            .collect())
    }
}
