//! Ranked retrieval over indexed proposal documents.
//!
//! The index itself is an external service. [`SearchIndex`] is the seam
//! the retriever talks to; [`AzureSearchIndex`] targets a hosted hybrid
//! keyword + vector index and [`MemoryIndex`] serves a local JSON corpus.

pub mod azure;
pub mod memory;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::core::EvidenceItem;
use crate::error::RetrievalError;

pub use azure::{AzureSearchConfig, AzureSearchIndex, build_filter};
pub use memory::MemoryIndex;

/// Default number of items returned per search call.
pub const DEFAULT_TOP_K: usize = 5;

/// One ranked-retrieval request.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Query text.
    pub query: &'a str,
    /// Identifiers that must not be returned.
    pub exclude_ids: &'a HashSet<String>,
    /// Restrict results to this document collection.
    pub scope: Option<&'a str>,
    /// Maximum number of items to return.
    pub top_k: usize,
}

/// Ranked retrieval capability.
///
/// Implementations return at most `top_k` items ordered by descending
/// relevance, honouring `exclude_ids` and `scope`.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Runs one search.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError`] on transport, service or decoding failures.
    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<EvidenceItem>, RetrievalError>;
}
