//! HTTP search-index client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use super::{QueryVariant, SearchError, SearchFilters, SearchHit, SearchIndex};
use crate::model::{ArtifactType, BoundingRegion, SearchConfig};

const USER_AGENT: &str = "conforma-engine/0.1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for a REST chunk index exposing keyword, semantic-reranked and
/// vector query modes on one search endpoint.
pub struct HttpSearchIndex {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    index: String,
}

impl HttpSearchIndex {
    pub fn new(config: &SearchConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            index: config.index.clone(),
        }
    }

    fn search_url(&self) -> Result<Url, SearchError> {
        self.endpoint
            .join(&format!("indexes/{}/docs/search", self.index))
            .map_err(|e| SearchError::ParseError(format!("invalid search endpoint: {}", e)))
    }

    fn filter_expression(filters: &SearchFilters) -> String {
        let mut clauses = vec![
            format!("document_id eq '{}'", filters.document_id),
            format!("org_id eq '{}'", filters.org_id),
        ];
        if let Some(artifact_type) = filters.artifact_type {
            clauses.push(format!("artifact_type eq '{}'", artifact_type.label()));
        }
        if filters.risk_content_only {
            clauses.push("risk_content eq true".to_string());
        }
        clauses.join(" and ")
    }

    fn request_body(variant: &QueryVariant, filters: &SearchFilters, top_k: usize) -> Value {
        let filter = Self::filter_expression(filters);
        match variant {
            QueryVariant::Dense { vector, .. } => json!({
                "filter": filter,
                "vectorQueries": [{
                    "kind": "vector",
                    "vector": vector,
                    "fields": "content_vector",
                    "k": top_k,
                }],
            }),
            QueryVariant::Keyword { query } => json!({
                "search": query,
                "queryType": "simple",
                "filter": filter,
                "top": top_k,
            }),
            QueryVariant::Semantic { query } => json!({
                "search": query,
                "queryType": "semantic",
                "filter": filter,
                "top": top_k,
            }),
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(
        &self,
        variant: &QueryVariant,
        filters: &SearchFilters,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let url = self.search_url()?;
        let body = Self::request_body(variant, filters, top_k);

        tracing::debug!(
            strategy = variant.strategy(),
            document = %filters.document_id,
            top_k = top_k,
            "Querying chunk index"
        );

        let mut request = self
            .client
            .post(url)
            .header("User-Agent", USER_AGENT)
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SearchError::Unavailable(e.to_string())
            } else {
                SearchError::HttpError(e)
            }
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(strategy = variant.strategy(), "Chunk index rate limited");
            return Err(SearchError::RateLimited);
        }

        if response.status().is_server_error() {
            return Err(SearchError::Unavailable(format!(
                "HTTP {} from chunk index",
                response.status()
            )));
        }

        if !response.status().is_success() {
            return Err(SearchError::ParseError(format!(
                "HTTP {} from chunk index",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let hits = parse_hits(&payload, variant)?;

        tracing::debug!(
            strategy = variant.strategy(),
            hits = hits.len(),
            "Chunk index query complete"
        );

        Ok(hits)
    }
}

/// Parse the index response's `value` array into hits.
///
/// Semantic queries score by the reranker field when the index returns one.
fn parse_hits(payload: &Value, variant: &QueryVariant) -> Result<Vec<SearchHit>, SearchError> {
    let rows = payload
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::ParseError("response missing 'value' array".to_string()))?;

    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        let chunk_id = match row.get("chunk_id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };

        let raw_score = match variant {
            QueryVariant::Semantic { .. } => row
                .get("@search.reranker_score")
                .and_then(Value::as_f64)
                .or_else(|| row.get("@search.score").and_then(Value::as_f64)),
            _ => row.get("@search.score").and_then(Value::as_f64),
        }
        .unwrap_or(0.0);

        hits.push(SearchHit {
            chunk_id,
            text: row
                .get("content_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            page: row
                .get("locationMetadata")
                .and_then(|m| m.get("pageNumber"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
            section: row
                .get("section_path")
                .and_then(Value::as_str)
                .map(str::to_string),
            region: parse_region(row),
            artifact_type: parse_artifact_type(row),
            raw_score,
        });
    }

    Ok(hits)
}

fn parse_region(row: &Value) -> Option<BoundingRegion> {
    let region = row.get("locationMetadata")?.get("boundingRegion")?;
    Some(BoundingRegion {
        x: region.get("x")?.as_f64()? as f32,
        y: region.get("y")?.as_f64()? as f32,
        width: region.get("width")?.as_f64()? as f32,
        height: region.get("height")?.as_f64()? as f32,
    })
}

fn parse_artifact_type(row: &Value) -> ArtifactType {
    match row.get("artifact_type").and_then(Value::as_str) {
        Some("table") => ArtifactType::Table,
        Some("figure") => ArtifactType::Figure,
        Some("cross-reference") | Some("cross_reference") => ArtifactType::CrossReference,
        _ => ArtifactType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> Value {
        json!({
            "value": [
                {
                    "chunk_id": "c-1",
                    "content_text": "The risk management plan defines scope.",
                    "@search.score": 4.2,
                    "@search.reranker_score": 2.9,
                    "artifact_type": "text",
                    "section_path": "4.1 Planning",
                    "locationMetadata": { "pageNumber": 12 }
                },
                {
                    "chunk_id": "",
                    "content_text": "dropped: no chunk id"
                },
                {
                    "chunk_id": "c-2",
                    "content_text": "Severity table",
                    "@search.score": 1.1,
                    "artifact_type": "table"
                }
            ]
        })
    }

    #[test]
    fn parses_hits_and_skips_rows_without_chunk_id() {
        let variant = QueryVariant::Keyword {
            query: "risk management plan".to_string(),
        };
        let hits = parse_hits(&sample_payload(), &variant).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "c-1");
        assert_eq!(hits[0].page, 12);
        assert_eq!(hits[0].raw_score, 4.2);
        assert_eq!(hits[1].artifact_type, ArtifactType::Table);
    }

    #[test]
    fn semantic_variant_prefers_reranker_score() {
        let variant = QueryVariant::Semantic {
            query: "risk management plan".to_string(),
        };
        let hits = parse_hits(&sample_payload(), &variant).unwrap();
        assert_eq!(hits[0].raw_score, 2.9);
        // Falls back to the plain score when no reranker score is present.
        assert_eq!(hits[1].raw_score, 1.1);
    }

    #[test]
    fn filter_expression_includes_optional_clauses() {
        let mut filters = SearchFilters::scope("doc-1", "org-1");
        filters.artifact_type = Some(ArtifactType::Table);
        filters.risk_content_only = true;
        let expr = HttpSearchIndex::filter_expression(&filters);
        assert!(expr.contains("document_id eq 'doc-1'"));
        assert!(expr.contains("artifact_type eq 'table'"));
        assert!(expr.contains("risk_content eq true"));
    }

    #[test]
    fn missing_value_array_is_a_parse_error() {
        let variant = QueryVariant::Keyword {
            query: "plan".to_string(),
        };
        let err = parse_hits(&json!({"unexpected": true}), &variant).unwrap_err();
        assert!(matches!(err, SearchError::ParseError(_)));
    }
}
