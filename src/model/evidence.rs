use serde::{Deserialize, Serialize};

use crate::model::requirement::ArtifactType;

/// Rectangular region on a page, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Per-strategy raw scores for a retrieved chunk.
///
/// A score is `None` when the chunk was not returned by that strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyScores {
    pub dense: Option<f64>,
    pub keyword: Option<f64>,
    pub semantic: Option<f64>,
}

/// A document chunk returned by retrieval, carrying its fused ranking score.
///
/// Candidates live only between retrieval and bundle construction; they are
/// not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedCandidate {
    pub chunk_id: String,
    pub document_id: String,
    pub page: u32,
    pub section: Option<String>,
    pub region: Option<BoundingRegion>,
    pub artifact_type: ArtifactType,
    pub text: String,
    pub scores: StrategyScores,
    pub fused_score: f64,
}

/// A scored excerpt inside an [`EvidenceBundle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub artifact_type: ArtifactType,
    pub page: u32,
    pub section: Option<String>,
    pub region: Option<BoundingRegion>,
    pub content: String,
    /// Relevance in [0, 1] from the relevance scorer.
    pub relevance: f64,
    pub matched_concepts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Direct,
    Indirect,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    Strong,
    Moderate,
    Weak,
}

/// The finalized, classified set of excerpts considered relevant to one
/// requirement. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub requirement_id: String,
    pub document_id: String,
    pub evidence_type: EvidenceType,
    pub strength: EvidenceStrength,
    /// Surviving artifacts, strongest first, capped by the bundle builder.
    pub artifacts: Vec<EvidenceArtifact>,
    /// Human-readable names of expected-but-missing evidence.
    pub gaps: Vec<String>,
}
