//! Structured-output schemas enforced on the language model.
//!
//! Any payload that does not deserialize into these types is treated as a
//! failed evaluation, never partially trusted.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedJudgement {
    pub status: ExtractedStatus,
    /// Explanation of satisfied/unsatisfied criteria, with citations.
    pub rationale: String,
    /// Short summary of the evidence the judgement relied on.
    pub evidence_summary: String,
    pub citations: Vec<ExtractedCitation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedCitation {
    pub page: u32,
    /// Verbatim quote from the supplied evidence.
    pub quote: String,
    pub section: Option<String>,
    /// Model-reported confidence in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractedStatus {
    Pass,
    Fail,
    Flagged,
    NotApplicable,
}

/// Second, independent judgement used by consensus reconciliation. It sees
/// only the first verdict's status, rationale and evidence summary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedSecondOpinion {
    pub status: ExtractedStatus,
    pub rationale: String,
}
