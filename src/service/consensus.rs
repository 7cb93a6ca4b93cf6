//! Consensus reconciliation
//!
//! A second, independent judgement for high-interpretation-risk verdicts.
//! The second model sees only the first verdict's status, rationale and
//! evidence summary; reconciliation itself is a pure function so the policy
//! is testable without a model. A second opinion can only hold or lower a
//! verdict, never raise it.

use std::sync::Arc;

use crate::model::{EvaluationVerdict, ExtractedStatus, VerdictStatus};
use crate::service::llm::JudgementProvider;
use crate::service::retry::{with_retries, RetryPolicy};

pub const SECOND_OPINION_SYSTEM_PROMPT: &str = r#"You are an independent compliance reviewer giving a second opinion on a colleague's verdict.

You are shown the verdict's status, rationale and evidence summary, but not the underlying evidence. Judge whether the stated rationale and summary actually support the stated status.

Respond with the status you would assign and a short rationale. Your output must be structured JSON only and conform to the requested schema."#;

/// Outcome of reconciling the second opinion against the original verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Second opinion agreed; verdict unchanged.
    Agreed,
    /// Disagreement on an original PASS; downgraded to FLAGGED.
    Downgraded,
    /// Disagreement recorded in the rationale; status unchanged.
    Recorded,
    /// The second opinion could not be obtained; verdict unchanged.
    Unavailable,
}

/// Deterministic reconciliation rule.
pub fn resolve_disagreement(original: VerdictStatus, second: VerdictStatus) -> Resolution {
    if original == second {
        Resolution::Agreed
    } else if original == VerdictStatus::Pass {
        Resolution::Downgraded
    } else {
        Resolution::Recorded
    }
}

pub struct ConsensusReconciler {
    provider: Arc<dyn JudgementProvider>,
    retry: RetryPolicy,
}

impl ConsensusReconciler {
    pub fn new(provider: Arc<dyn JudgementProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Obtain a second opinion and reconcile it into the verdict.
    ///
    /// The verdict is mutated at most once: a status downgrade on a
    /// contested PASS, or an appended rationale note otherwise.
    pub async fn reconcile(&self, verdict: &mut EvaluationVerdict) -> Resolution {
        let prompt = build_second_opinion_prompt(verdict);

        let opinion = match with_retries(&self.retry, "second_opinion", |_| true, || {
            self.provider
                .second_opinion(SECOND_OPINION_SYSTEM_PROMPT, &prompt)
        })
        .await
        {
            Ok(opinion) => opinion,
            Err(e) => {
                tracing::warn!(
                    requirement = %verdict.requirement_id,
                    error = %e,
                    "Second opinion unavailable, keeping original verdict"
                );
                verdict
                    .rationale
                    .push_str("\n\nNote: consensus review could not be completed.");
                return Resolution::Unavailable;
            }
        };

        let second_status = convert_status(opinion.status);
        let resolution = resolve_disagreement(verdict.status, second_status);

        match resolution {
            Resolution::Agreed => {
                tracing::debug!(
                    requirement = %verdict.requirement_id,
                    status = %verdict.status,
                    "Second opinion agreed"
                );
            }
            Resolution::Downgraded => {
                tracing::warn!(
                    requirement = %verdict.requirement_id,
                    second_status = %second_status,
                    "Second opinion contested PASS, downgrading"
                );
                verdict.status = VerdictStatus::Flagged;
                verdict.rationale.push_str(&format!(
                    "\n\nNote: an independent second review assessed this as {} and contested the \
                     PASS; downgraded to FLAGGED. Second review rationale: {}",
                    second_status, opinion.rationale
                ));
            }
            Resolution::Recorded => {
                tracing::info!(
                    requirement = %verdict.requirement_id,
                    status = %verdict.status,
                    second_status = %second_status,
                    "Second opinion disagreed, recording without status change"
                );
                verdict.rationale.push_str(&format!(
                    "\n\nNote: an independent second review assessed this as {}; the original \
                     status stands. Second review rationale: {}",
                    second_status, opinion.rationale
                ));
            }
            Resolution::Unavailable => unreachable!("handled above"),
        }

        resolution
    }
}

fn build_second_opinion_prompt(verdict: &EvaluationVerdict) -> String {
    format!(
        "# Verdict Under Review\n\n\
         Requirement: {}\n\
         Status: {}\n\n\
         ## Rationale\n{}\n\n\
         ## Evidence Summary\n{}\n\n\
         Does the rationale and evidence summary support the status? Respond with the status you \
         would assign.",
        verdict.requirement_id, verdict.status, verdict.rationale, verdict.evidence_summary
    )
}

fn convert_status(status: ExtractedStatus) -> VerdictStatus {
    match status {
        ExtractedStatus::Pass => VerdictStatus::Pass,
        ExtractedStatus::Fail => VerdictStatus::Fail,
        ExtractedStatus::Flagged => VerdictStatus::Flagged,
        ExtractedStatus::NotApplicable => VerdictStatus::NotApplicable,
    }
}
