//! Evidence fusion retriever
//!
//! Fans one requirement out to three retrieval strategies against the chunk
//! index, deduplicates by chunk identity, and fuses the per-strategy scores
//! into a single ranked candidate list.

pub mod keyphrase;

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Requirement, RetrievedCandidate, StrategyScores};
use crate::search::{
    EmbeddingService, QueryVariant, SearchError, SearchFilters, SearchHit, SearchIndex,
};
use crate::service::retry::{with_retries, RetryPolicy};

/// Fixed fusion weights. The semantic strategy is weighted highest because
/// its server-side reranking already incorporates cross-encoding relevance.
pub const DENSE_WEIGHT: f64 = 1.0;
pub const KEYWORD_WEIGHT: f64 = 0.8;
pub const SEMANTIC_WEIGHT: f64 = 1.2;

/// Character cap applied to query text sent to the index and the embedder.
const MAX_QUERY_TEXT: usize = 2000;

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The index or embedding service stayed unreachable through retries.
    /// Distinct from an empty result: "could not check" is not "evidence
    /// absent".
    #[error("retrieval unavailable ({strategy}): {source}")]
    Unavailable {
        strategy: &'static str,
        source: SearchError,
    },
}

pub struct FusionRetriever {
    index: Arc<dyn SearchIndex>,
    embeddings: Arc<dyn EmbeddingService>,
    retry: RetryPolicy,
    top_k: usize,
}

impl FusionRetriever {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        embeddings: Arc<dyn EmbeddingService>,
        retry: RetryPolicy,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embeddings,
            retry,
            top_k: top_k.max(1),
        }
    }

    /// Retrieve and fuse candidates for one requirement within one document
    /// scope.
    pub async fn retrieve(
        &self,
        requirement: &Requirement,
        filters: &SearchFilters,
    ) -> Result<Vec<RetrievedCandidate>, RetrievalError> {
        let dense_text = truncate(
            &format!("{}. {}", requirement.title, requirement.text),
            MAX_QUERY_TEXT,
        );
        let keyword_query = keyphrase::build_keyword_query(requirement);
        let semantic_query = truncate(&requirement.text, MAX_QUERY_TEXT);

        let vector = with_retries(&self.retry, "embed", SearchError::is_retryable, || {
            self.embeddings.embed(&dense_text)
        })
        .await
        .map_err(|source| RetrievalError::Unavailable {
            strategy: "dense",
            source,
        })?;

        let dense = QueryVariant::Dense {
            text: dense_text,
            vector,
        };
        let keyword = QueryVariant::Keyword {
            query: keyword_query,
        };
        let semantic = QueryVariant::Semantic {
            query: semantic_query,
        };

        let (dense_hits, keyword_hits, semantic_hits) = tokio::join!(
            self.search_strategy(&dense, filters),
            self.search_strategy(&keyword, filters),
            self.search_strategy(&semantic, filters),
        );

        let candidates = fuse(
            &filters.document_id,
            dense_hits?,
            keyword_hits?,
            semantic_hits?,
            self.top_k,
        );

        tracing::info!(
            requirement = %requirement.id,
            document = %filters.document_id,
            candidates = candidates.len(),
            "Evidence retrieval complete"
        );

        Ok(candidates)
    }

    async fn search_strategy(
        &self,
        variant: &QueryVariant,
        filters: &SearchFilters,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        with_retries(
            &self.retry,
            variant.strategy(),
            SearchError::is_retryable,
            || self.index.search(variant, filters, self.top_k),
        )
        .await
        .map_err(|source| RetrievalError::Unavailable {
            strategy: variant.strategy(),
            source,
        })
    }
}

/// Deduplicate hits by chunk id and combine strategy scores additively with
/// the fixed weights. Pure: a fixed set of per-strategy hit lists always
/// produces the same ranking.
pub fn fuse(
    document_id: &str,
    dense: Vec<SearchHit>,
    keyword: Vec<SearchHit>,
    semantic: Vec<SearchHit>,
    top_k: usize,
) -> Vec<RetrievedCandidate> {
    let mut by_chunk: HashMap<String, RetrievedCandidate> = HashMap::new();

    let mut absorb = |hits: Vec<SearchHit>, strategy: &str| {
        for hit in hits {
            let entry = by_chunk
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| RetrievedCandidate {
                    chunk_id: hit.chunk_id.clone(),
                    document_id: document_id.to_string(),
                    page: hit.page,
                    section: hit.section.clone(),
                    region: hit.region,
                    artifact_type: hit.artifact_type,
                    text: hit.text.clone(),
                    scores: StrategyScores::default(),
                    fused_score: 0.0,
                });
            match strategy {
                "dense" => entry.scores.dense = Some(hit.raw_score),
                "keyword" => entry.scores.keyword = Some(hit.raw_score),
                _ => entry.scores.semantic = Some(hit.raw_score),
            }
        }
    };

    absorb(dense, "dense");
    absorb(keyword, "keyword");
    absorb(semantic, "semantic");

    let mut candidates: Vec<RetrievedCandidate> = by_chunk
        .into_values()
        .map(|mut candidate| {
            candidate.fused_score = candidate.scores.dense.unwrap_or(0.0) * DENSE_WEIGHT
                + candidate.scores.keyword.unwrap_or(0.0) * KEYWORD_WEIGHT
                + candidate.scores.semantic.unwrap_or(0.0) * SEMANTIC_WEIGHT;
            candidate
        })
        .collect();

    // Chunk id as tie-break keeps equal-score orderings reproducible.
    candidates.sort_by(|a, b| {
        b.fused_score
            .total_cmp(&a.fused_score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    candidates.truncate(top_k);
    candidates
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}
