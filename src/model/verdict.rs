use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::evidence::EvidenceStrength;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    Flagged,
    NotApplicable,
}

impl VerdictStatus {
    pub fn label(&self) -> &'static str {
        match self {
            VerdictStatus::Pass => "PASS",
            VerdictStatus::Fail => "FAIL",
            VerdictStatus::Flagged => "FLAGGED",
            VerdictStatus::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A quoted reference into the evaluated document.
///
/// Produced by the verdict engine and mutated in place by the citation
/// verifier: the quote may be rewritten to the actual matched substring, or
/// the confidence forced to 0 when no match exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    pub quote: String,
    pub section: Option<String>,
    /// In [0, 1]; exactly 0 when the citation is unverifiable.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Complete,
    Partial,
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpretationRisk {
    Low,
    Medium,
    High,
}

/// Deterministic confidence metrics, computed from the bundle and the final
/// status rather than taken from model self-reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceMetrics {
    pub evidence_strength: EvidenceStrength,
    pub coverage: Coverage,
    pub interpretation_risk: InterpretationRisk,
}

/// Remediation guidance attached to FAIL verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub missing_elements: Vec<String>,
    pub suggested_sections: Vec<String>,
    pub remediation_example: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    pub model: String,
    pub prompt_version: String,
    /// Retrieval candidates considered, including those below the relevance
    /// floor.
    pub candidates_considered: usize,
    /// Estimated when the model provider does not report usage.
    pub tokens_used: u32,
    pub evaluated_at: DateTime<Utc>,
}

/// One requirement evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub requirement_id: String,
    pub document_id: String,
    pub run_id: Uuid,
    pub status: VerdictStatus,
    pub rationale: String,
    pub evidence_summary: String,
    pub citations: Vec<Citation>,
    pub confidence: ConfidenceMetrics,
    pub gap_analysis: Option<GapAnalysis>,
    pub metadata: EvaluationMetadata,
}

/// One logged evaluation run under batch instrumentation. Append-only;
/// consumed by the repeatability analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub batch_id: String,
    pub config_label: String,
    pub document_id: String,
    pub requirement_id: String,
    pub run_index: u32,
    pub status_label: String,
    pub raw_verdict: serde_json::Value,
}

/// Stability of repeated runs for one (batch, document, requirement) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatabilityResult {
    pub batch_id: String,
    pub document_id: String,
    pub requirement_id: String,
    pub modal_label: String,
    /// Modal count / total runs, always in (0, 1].
    pub repeatability: f64,
    pub total_runs: usize,
}

/// Stability delta between two batches for one (document, requirement) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatabilityDelta {
    pub document_id: String,
    pub requirement_id: String,
    pub baseline: f64,
    pub candidate: f64,
    /// candidate − baseline; positive means the new configuration is more
    /// stable.
    pub delta: f64,
}

/// Failure recorded for a single requirement during a document run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementFailure {
    pub requirement_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total_requirements: usize,
    pub status_counts: BTreeMap<String, usize>,
    /// PASS / (scored − NOT_APPLICABLE) × 100; 0 when nothing was scored.
    pub compliance_score: f64,
}

/// Aggregate result of evaluating one document against a requirement set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEvaluation {
    pub document_id: String,
    pub verdicts: Vec<EvaluationVerdict>,
    pub failures: Vec<RequirementFailure>,
    /// Requirement ids skipped after the circuit breaker tripped.
    pub skipped: Vec<String>,
    pub aborted: bool,
    pub summary: EvaluationSummary,
}

impl DocumentEvaluation {
    pub fn summarize(verdicts: &[EvaluationVerdict], failures: usize, skipped: usize) -> EvaluationSummary {
        let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
        for verdict in verdicts {
            *status_counts.entry(verdict.status.label().to_string()).or_default() += 1;
        }

        let passed = status_counts.get("PASS").copied().unwrap_or(0);
        let na = status_counts.get("NOT_APPLICABLE").copied().unwrap_or(0);
        let scored = verdicts.len().saturating_sub(na);
        let compliance_score = if scored > 0 {
            (passed as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        EvaluationSummary {
            total_requirements: verdicts.len() + failures + skipped,
            status_counts,
            compliance_score,
        }
    }
}
