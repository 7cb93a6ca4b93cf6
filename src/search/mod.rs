//! External search-index and embedding collaborators.
//!
//! The engine never reads documents directly; evidence arrives as indexed
//! chunks from a search service, queried through the three strategies the
//! fusion retriever fans out to.

mod embedding;
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{ArtifactType, BoundingRegion};

pub use embedding::HttpEmbeddingService;
pub use http::HttpSearchIndex;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search service unreachable: {0}")]
    Unavailable(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    ParseError(String),

    #[error("rate limited")]
    RateLimited,
}

impl SearchError {
    /// Transient failures worth retrying before surfacing
    /// retrieval-unavailable to the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Unavailable(_) | SearchError::RateLimited => true,
            SearchError::HttpError(e) => e.is_timeout() || e.is_connect(),
            SearchError::ParseError(_) => false,
        }
    }
}

/// One retrieval strategy's query against the chunk index.
#[derive(Debug, Clone)]
pub enum QueryVariant {
    /// Vector similarity over the embedded requirement text.
    Dense { text: String, vector: Vec<f32> },
    /// Lexical match over evaluation hints and extracted key phrases.
    Keyword { query: String },
    /// Semantic query with server-side reranking.
    Semantic { query: String },
}

impl QueryVariant {
    pub fn strategy(&self) -> &'static str {
        match self {
            QueryVariant::Dense { .. } => "dense",
            QueryVariant::Keyword { .. } => "keyword",
            QueryVariant::Semantic { .. } => "semantic",
        }
    }
}

/// Scope applied to every strategy of one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    pub document_id: String,
    pub org_id: String,
    /// Restrict to one artifact type when set.
    pub artifact_type: Option<ArtifactType>,
    /// Restrict to chunks tagged as risk-related content.
    #[serde(default)]
    pub risk_content_only: bool,
}

impl SearchFilters {
    pub fn scope(document_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            org_id: org_id.into(),
            artifact_type: None,
            risk_content_only: false,
        }
    }
}

/// One chunk returned by the index for a single strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub text: String,
    pub page: u32,
    pub section: Option<String>,
    pub region: Option<BoundingRegion>,
    pub artifact_type: ArtifactType,
    pub raw_score: f64,
}

/// Document-chunk index collaborator.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(
        &self,
        variant: &QueryVariant,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Embedding collaborator used to build the dense query variant.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}
