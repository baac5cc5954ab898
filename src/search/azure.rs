//! Hosted hybrid search index over REST.
//!
//! Issues one request per search combining full-text and vector legs.
//! The query vector comes from the injected [`Embedder`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{SearchIndex, SearchRequest};
use crate::agent::prompt::truncate_chars;
use crate::agent::provider::Embedder;
use crate::core::EvidenceItem;
use crate::error::RetrievalError;

/// Default REST API version.
const DEFAULT_API_VERSION: &str = "2024-07-01";
/// Default neighbour count for the vector leg.
const DEFAULT_K_NEAREST: usize = 30;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Vector field holding chunk embeddings.
const VECTOR_FIELD: &str = "chunk_content_vector";
/// Fields returned for each hit.
const SELECT_FIELDS: &str = "chunk_id,chunk_content,pursuit_name,file_name,pages";
/// Longest error body kept in [`RetrievalError::Status`].
const MAX_ERROR_BODY: usize = 500;

/// Connection settings for the hosted index.
#[derive(Debug, Clone)]
pub struct AzureSearchConfig {
    /// Service endpoint, e.g. `https://my-search.search.windows.net`.
    pub endpoint: String,
    /// Admin or query key.
    pub api_key: String,
    /// Index name.
    pub index_name: String,
    /// REST API version.
    pub api_version: String,
    /// Neighbour count for the vector query.
    pub k_nearest_neighbors: usize,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl AzureSearchConfig {
    /// Creates a configuration with default API version, neighbour count and timeout.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            index_name: index_name.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            k_nearest_neighbors: DEFAULT_K_NEAREST,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Reads `RFP_SEARCH_ENDPOINT`, `RFP_SEARCH_KEY`, `RFP_SEARCH_INDEX`
    /// and the optional `RFP_SEARCH_API_VERSION` / `RFP_SEARCH_KNN`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] naming the first missing variable.
    pub fn from_env() -> Result<Self, RetrievalError> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| RetrievalError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("RFP_SEARCH_ENDPOINT")?,
            required("RFP_SEARCH_KEY")?,
            required("RFP_SEARCH_INDEX")?,
        );
        if let Ok(version) = std::env::var("RFP_SEARCH_API_VERSION") {
            config.api_version = version;
        }
        if let Some(k) = std::env::var("RFP_SEARCH_KNN")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.k_nearest_neighbors = k;
        }
        Ok(config)
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.index_name,
            self.api_version
        )
    }
}

/// Builds the OData filter excluding processed ids and scoping to one collection.
///
/// Returns `None` when neither constraint applies. Single quotes in values
/// are doubled per OData string-literal rules.
#[must_use]
pub fn build_filter(exclude_ids: &HashSet<String>, scope: Option<&str>) -> Option<String> {
    let mut parts = Vec::with_capacity(2);

    if !exclude_ids.is_empty() {
        let mut ids: Vec<&str> = exclude_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        let joined = ids.join(",").replace('\'', "''");
        parts.push(format!("not search.in(chunk_id, '{joined}', ',')"));
    }

    if let Some(scope) = scope {
        parts.push(format!("(pursuit_name eq '{}')", scope.replace('\'', "''")));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" and "))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    value: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "@search.score", default)]
    score: f64,
    chunk_id: String,
    chunk_content: String,
    pursuit_name: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    pages: Option<Vec<u32>>,
}

impl From<SearchHit> for EvidenceItem {
    fn from(hit: SearchHit) -> Self {
        Self {
            id: hit.chunk_id,
            content: hit.chunk_content,
            source: hit.pursuit_name,
            file_name: hit.file_name,
            pages: hit.pages.unwrap_or_default(),
            score: hit.score,
        }
    }
}

/// Hybrid keyword + vector index client.
pub struct AzureSearchIndex {
    http: reqwest::Client,
    config: AzureSearchConfig,
    embedder: Arc<dyn Embedder>,
}

impl AzureSearchIndex {
    /// Creates a client for the configured index.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Config`] if the HTTP client cannot be built.
    pub fn new(config: AzureSearchConfig, embedder: Arc<dyn Embedder>) -> Result<Self, RetrievalError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            embedder,
        })
    }

    fn request_body(&self, request: &SearchRequest<'_>, vector: Vec<f32>) -> serde_json::Value {
        let mut body = json!({
            "search": request.query,
            "vectorQueries": [{
                "kind": "vector",
                "vector": vector,
                "k": self.config.k_nearest_neighbors,
                "fields": VECTOR_FIELD,
            }],
            "select": SELECT_FIELDS,
            "top": request.top_k,
        });
        if let Some(filter) = build_filter(request.exclude_ids, request.scope) {
            body["filter"] = json!(filter);
        }
        body
    }
}

impl std::fmt::Debug for AzureSearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSearchIndex")
            .field("endpoint", &self.config.endpoint)
            .field("index_name", &self.config.index_name)
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchIndex for AzureSearchIndex {
    fn name(&self) -> &'static str {
        "azure"
    }

    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<EvidenceItem>, RetrievalError> {
        let vector = self.embedder.embed(request.query).await?;
        let body = self.request_body(request, vector);

        let response = self
            .http
            .post(self.config.search_url())
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            truncate_chars(&mut text, MAX_ERROR_BODY);
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Malformed(e.to_string()))?;

        debug!(hits = parsed.value.len(), index = %self.config.index_name, "search completed");

        Ok(parsed.value.into_iter().map(EvidenceItem::from).collect())
    }
}
