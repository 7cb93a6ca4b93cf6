//! Verdict engine
//!
//! Obtains a structured judgement from the language model and applies the
//! deterministic decision and confidence policy on top of it.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::model::{
    Citation, ConfidenceMetrics, DocumentContext, EvaluationMetadata, EvaluationVerdict,
    EvidenceBundle, ExtractedStatus, Requirement, VerdictStatus,
};
use crate::service::llm::{JudgementProvider, JudgementResponse};
use crate::service::retry::{with_retries, RetryPolicy};

pub mod error;
pub mod policy;
pub mod prompts;

pub use error::VerdictError;

/// Bumped whenever the prompt wording changes, so repeatability batches can
/// tell configurations apart.
pub const PROMPT_VERSION: &str = "v3";

pub struct VerdictEngine {
    provider: Arc<dyn JudgementProvider>,
    retry: RetryPolicy,
}

impl VerdictEngine {
    pub fn new(provider: Arc<dyn JudgementProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Judge one requirement against its evidence bundle.
    ///
    /// `candidates_considered` is the pre-threshold retrieval count, recorded
    /// in the verdict metadata for diagnostics.
    pub async fn evaluate(
        &self,
        requirement: &Requirement,
        bundle: &EvidenceBundle,
        context: &DocumentContext,
        candidates_considered: usize,
    ) -> Result<EvaluationVerdict, VerdictError> {
        let prompt = prompts::build_evaluation_prompt(requirement, bundle, context);

        let JudgementResponse {
            judgement,
            tokens_used,
        } = with_retries(&self.retry, "judgement", |_| true, || {
            self.provider
                .judge(prompts::EVALUATION_SYSTEM_PROMPT, &prompt)
        })
        .await?;

        let citations: Vec<Citation> = judgement
            .citations
            .into_iter()
            .map(|c| Citation {
                page: c.page,
                quote: c.quote,
                section: c.section,
                confidence: c.confidence.clamp(0.0, 1.0),
            })
            .collect();

        let model_status = convert_status(judgement.status);
        let (status, policy_note) =
            policy::apply_decision_policy(model_status, citations.len(), bundle.evidence_type);

        let mut rationale = judgement.rationale;
        if let Some(note) = policy_note {
            tracing::warn!(
                requirement = %requirement.id,
                model_status = %model_status,
                status = %status,
                "Decision policy downgraded the model's status"
            );
            rationale.push_str("\n\nNote: ");
            rationale.push_str(&note);
        }

        let confidence = ConfidenceMetrics {
            evidence_strength: bundle.strength,
            coverage: policy::coverage(bundle),
            interpretation_risk: policy::interpretation_risk(
                status,
                bundle.strength,
                bundle.evidence_type,
            ),
        };

        let gap_analysis = (status == VerdictStatus::Fail)
            .then(|| policy::build_gap_analysis(requirement, bundle));

        Ok(EvaluationVerdict {
            requirement_id: requirement.id.clone(),
            document_id: bundle.document_id.clone(),
            run_id: Uuid::new_v4(),
            status,
            rationale,
            evidence_summary: judgement.evidence_summary,
            citations,
            confidence,
            gap_analysis,
            metadata: EvaluationMetadata {
                model: self.provider.model_id().to_string(),
                prompt_version: PROMPT_VERSION.to_string(),
                candidates_considered,
                tokens_used,
                evaluated_at: Utc::now(),
            },
        })
    }
}

fn convert_status(status: ExtractedStatus) -> VerdictStatus {
    match status {
        ExtractedStatus::Pass => VerdictStatus::Pass,
        ExtractedStatus::Fail => VerdictStatus::Fail,
        ExtractedStatus::Flagged => VerdictStatus::Flagged,
        ExtractedStatus::NotApplicable => VerdictStatus::NotApplicable,
    }
}
