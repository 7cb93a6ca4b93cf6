//! Requirement evaluation pipeline
//!
//! Wires retrieval, bundle construction, judgement, citation verification
//! and consensus into one per-requirement call, and runs whole documents
//! through a bounded-concurrency loop with a consecutive-failure circuit
//! breaker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::error::EngineError;
use crate::model::{
    DocumentContext, DocumentEvaluation, EvaluationVerdict, InterpretationRisk, LimitsConfig,
    Requirement, RequirementFailure, RunRecord,
};
use crate::search::{EmbeddingService, SearchFilters, SearchIndex};
use crate::service::bundle::{build_bundle, BundleOutcome};
use crate::service::citation::verify_citations;
use crate::service::consensus::ConsensusReconciler;
use crate::service::llm::JudgementProvider;
use crate::service::retry::RetryPolicy;
use crate::service::retrieval::FusionRetriever;
use crate::service::verdict::{policy, VerdictEngine};

/// Identifies one run within a repeatability batch. Passed explicitly so
/// runs stay independently reproducible.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub batch_id: String,
    pub config_label: String,
    pub run_index: u32,
}

pub struct EvaluationService {
    retriever: FusionRetriever,
    engine: VerdictEngine,
    reconciler: ConsensusReconciler,
    limits: LimitsConfig,
}

impl EvaluationService {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        embeddings: Arc<dyn EmbeddingService>,
        provider: Arc<dyn JudgementProvider>,
        limits: LimitsConfig,
    ) -> Self {
        let retry = RetryPolicy::from_limits(&limits);

        Self {
            retriever: FusionRetriever::new(index, embeddings, retry, limits.top_k),
            engine: VerdictEngine::new(Arc::clone(&provider), retry),
            reconciler: ConsensusReconciler::new(provider, retry),
            limits,
        }
    }

    /// Evaluate one requirement against one document.
    ///
    /// Retrieval and judgement errors surface as typed errors; no status is
    /// ever guessed on infrastructure failure.
    pub async fn evaluate_requirement(
        &self,
        requirement: &Requirement,
        filters: &SearchFilters,
        context: &DocumentContext,
    ) -> Result<EvaluationVerdict, EngineError> {
        let candidates = self.retriever.retrieve(requirement, filters).await?;

        let BundleOutcome { bundle, considered } =
            build_bundle(requirement, &filters.document_id, candidates);

        let mut verdict = self
            .engine
            .evaluate(requirement, &bundle, context, considered)
            .await?;

        let citation_report = verify_citations(&mut verdict, &bundle);
        // Verification may have changed the status; keep the risk tag (and
        // with it the consensus trigger) consistent.
        verdict.confidence.interpretation_risk =
            policy::interpretation_risk(verdict.status, bundle.strength, bundle.evidence_type);

        if verdict.confidence.interpretation_risk == InterpretationRisk::High {
            self.reconciler.reconcile(&mut verdict).await;
            verdict.confidence.interpretation_risk = policy::interpretation_risk(
                verdict.status,
                bundle.strength,
                bundle.evidence_type,
            );
        }

        tracing::info!(
            requirement = %requirement.id,
            document = %filters.document_id,
            status = %verdict.status,
            citations = verdict.citations.len(),
            unverifiable_citations = citation_report.unverifiable,
            "Requirement evaluation complete"
        );

        Ok(verdict)
    }

    /// Evaluate one requirement under batch instrumentation, returning the
    /// verdict together with its append-only run record.
    pub async fn evaluate_requirement_instrumented(
        &self,
        requirement: &Requirement,
        filters: &SearchFilters,
        context: &DocumentContext,
        run: &RunContext,
    ) -> Result<(EvaluationVerdict, RunRecord), EngineError> {
        let verdict = self
            .evaluate_requirement(requirement, filters, context)
            .await?;

        let record = RunRecord {
            batch_id: run.batch_id.clone(),
            config_label: run.config_label.clone(),
            document_id: verdict.document_id.clone(),
            requirement_id: verdict.requirement_id.clone(),
            run_index: run.run_index,
            status_label: verdict.status.label().to_string(),
            raw_verdict: serde_json::to_value(&verdict).unwrap_or(serde_json::Value::Null),
        };

        Ok((verdict, record))
    }

    /// Evaluate a document against a requirement set with bounded
    /// concurrency.
    ///
    /// Each requirement gets its own timeout; consecutive failures beyond
    /// the configured threshold trip a circuit breaker that skips the rest
    /// and marks the result aborted, so the caller gets an explicit partial
    /// result instead of silently unreliable data.
    pub async fn evaluate_document(
        &self,
        requirements: &[Requirement],
        filters: &SearchFilters,
        context: &DocumentContext,
    ) -> DocumentEvaluation {
        let consecutive_failures = AtomicU32::new(0);
        let tripped = AtomicBool::new(false);
        let timeout = self.limits.requirement_timeout();

        enum Outcome {
            Verdict(Box<EvaluationVerdict>),
            Failed(RequirementFailure),
            Skipped(String),
        }

        let outcomes: Vec<Outcome> = stream::iter(requirements.iter().map(|requirement| {
            let consecutive_failures = &consecutive_failures;
            let tripped = &tripped;
            async move {
                if tripped.load(Ordering::SeqCst) {
                    return Outcome::Skipped(requirement.id.clone());
                }

                let result = tokio::time::timeout(
                    timeout,
                    self.evaluate_requirement(requirement, filters, context),
                )
                .await;

                match result {
                    Ok(Ok(verdict)) => {
                        consecutive_failures.store(0, Ordering::SeqCst);
                        Outcome::Verdict(Box::new(verdict))
                    }
                    Ok(Err(e)) => {
                        self.record_failure(requirement, consecutive_failures, tripped);
                        Outcome::Failed(RequirementFailure {
                            requirement_id: requirement.id.clone(),
                            error: e.to_string(),
                        })
                    }
                    Err(_) => {
                        self.record_failure(requirement, consecutive_failures, tripped);
                        Outcome::Failed(RequirementFailure {
                            requirement_id: requirement.id.clone(),
                            error: format!("evaluation timed out after {:?}", timeout),
                        })
                    }
                }
            }
        }))
        .buffered(self.limits.concurrency.max(1))
        .collect()
        .await;

        let mut verdicts = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Verdict(verdict) => verdicts.push(*verdict),
                Outcome::Failed(failure) => failures.push(failure),
                Outcome::Skipped(id) => skipped.push(id),
            }
        }

        let aborted = tripped.load(Ordering::SeqCst);
        let summary = DocumentEvaluation::summarize(&verdicts, failures.len(), skipped.len());

        tracing::info!(
            document = %filters.document_id,
            evaluated = verdicts.len(),
            failed = failures.len(),
            skipped = skipped.len(),
            aborted = aborted,
            compliance_score = summary.compliance_score,
            "Document evaluation complete"
        );

        DocumentEvaluation {
            document_id: filters.document_id.clone(),
            verdicts,
            failures,
            skipped,
            aborted,
            summary,
        }
    }

    fn record_failure(
        &self,
        requirement: &Requirement,
        consecutive_failures: &AtomicU32,
        tripped: &AtomicBool,
    ) {
        let failures = consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(
            requirement = %requirement.id,
            consecutive_failures = failures,
            threshold = self.limits.failure_threshold,
            "Requirement evaluation failed"
        );
        if failures >= self.limits.failure_threshold && !tripped.swap(true, Ordering::SeqCst) {
            tracing::error!(
                consecutive_failures = failures,
                "Circuit breaker tripped, skipping remaining requirements"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ArtifactType, ExtractedCitation, ExtractedJudgement, ExtractedSecondOpinion,
        ExtractedStatus, Priority, VerdictStatus,
    };
    use crate::search::{QueryVariant, SearchError, SearchHit};
    use crate::service::llm::{JudgementError, JudgementResponse};
    use async_trait::async_trait;

    struct StaticIndex {
        text: String,
    }

    #[async_trait]
    impl SearchIndex for StaticIndex {
        async fn search(
            &self,
            _variant: &QueryVariant,
            _filters: &SearchFilters,
            _top_k: usize,
        ) -> Result<Vec<SearchHit>, SearchError> {
            Ok(vec![SearchHit {
                chunk_id: "c-1".to_string(),
                text: self.text.clone(),
                page: 7,
                section: Some("4.4 Planning".to_string()),
                region: None,
                artifact_type: ArtifactType::Text,
                raw_score: 4.0,
            }])
        }
    }

    struct StaticEmbeddings;

    #[async_trait]
    impl EmbeddingService for StaticEmbeddings {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Ok(vec![0.0; 8])
        }
    }

    struct StaticProvider {
        judgement: Option<ExtractedJudgement>,
        second_opinion_status: ExtractedStatus,
    }

    #[async_trait]
    impl JudgementProvider for StaticProvider {
        async fn judge(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<JudgementResponse, JudgementError> {
            match &self.judgement {
                Some(judgement) => Ok(JudgementResponse {
                    judgement: judgement.clone(),
                    tokens_used: 200,
                }),
                None => Err(JudgementError::Model("schema violation".to_string())),
            }
        }

        async fn second_opinion(
            &self,
            _system: &str,
            _prompt: &str,
        ) -> Result<ExtractedSecondOpinion, JudgementError> {
            Ok(ExtractedSecondOpinion {
                status: self.second_opinion_status,
                rationale: "Independent read.".to_string(),
            })
        }

        fn model_id(&self) -> &str {
            "test-model"
        }
    }

    fn requirement(id: &str) -> Requirement {
        Requirement {
            id: id.to_string(),
            clause: "4.4".to_string(),
            category: "planning".to_string(),
            title: "Risk management plan".to_string(),
            text: "A risk management plan shall be established.".to_string(),
            acceptance_criteria: "Plan exists".to_string(),
            priority: Priority::High,
            evaluation_hints: vec!["risk management plan".to_string()],
            typical_artifact_types: vec![ArtifactType::Text],
        }
    }

    fn fast_limits() -> LimitsConfig {
        LimitsConfig {
            concurrency: 1,
            requirement_timeout_secs: 5,
            failure_threshold: 2,
            retry_max_attempts: 1,
            retry_initial_backoff_ms: 1,
            top_k: 10,
        }
    }

    fn passing_service() -> EvaluationService {
        EvaluationService::new(
            Arc::new(StaticIndex {
                text: "Our risk management plan defines the scope of activities.".to_string(),
            }),
            Arc::new(StaticEmbeddings),
            Arc::new(StaticProvider {
                judgement: Some(ExtractedJudgement {
                    status: ExtractedStatus::Pass,
                    rationale: "The plan is documented.".to_string(),
                    evidence_summary: "A plan exists with scope.".to_string(),
                    citations: vec![ExtractedCitation {
                        page: 7,
                        quote: "risk management plan defines the scope".to_string(),
                        section: None,
                        confidence: 0.9,
                    }],
                }),
                second_opinion_status: ExtractedStatus::Flagged,
            }),
            fast_limits(),
        )
    }

    #[tokio::test]
    async fn full_pipeline_produces_pass_with_verified_citation() {
        let service = passing_service();
        let filters = SearchFilters::scope("doc-1", "org-1");

        let verdict = service
            .evaluate_requirement(&requirement("REQ-1"), &filters, &DocumentContext::default())
            .await
            .unwrap();

        assert_eq!(verdict.status, VerdictStatus::Pass);
        assert_eq!(verdict.citations.len(), 1);
        assert_eq!(verdict.citations[0].confidence, 0.9);
        assert_eq!(
            verdict.confidence.interpretation_risk,
            InterpretationRisk::Low
        );
        assert_eq!(verdict.metadata.candidates_considered, 1);
    }

    #[tokio::test]
    async fn flagged_verdict_triggers_consensus_review() {
        let service = EvaluationService::new(
            Arc::new(StaticIndex {
                text: "Our risk management plan defines the scope of activities.".to_string(),
            }),
            Arc::new(StaticEmbeddings),
            Arc::new(StaticProvider {
                judgement: Some(ExtractedJudgement {
                    status: ExtractedStatus::Flagged,
                    rationale: "Partial evidence only.".to_string(),
                    evidence_summary: "Scope present, criteria unclear.".to_string(),
                    citations: vec![],
                }),
                // Disagrees, but a FLAGGED original is never changed.
                second_opinion_status: ExtractedStatus::Pass,
            }),
            fast_limits(),
        );
        let filters = SearchFilters::scope("doc-1", "org-1");

        let verdict = service
            .evaluate_requirement(&requirement("REQ-1"), &filters, &DocumentContext::default())
            .await
            .unwrap();

        assert_eq!(verdict.status, VerdictStatus::Flagged);
        assert!(verdict.rationale.contains("original status stands"));
    }

    #[tokio::test]
    async fn instrumented_run_emits_matching_run_record() {
        let service = passing_service();
        let filters = SearchFilters::scope("doc-1", "org-1");
        let run = RunContext {
            batch_id: "batch-7".to_string(),
            config_label: "baseline_v1".to_string(),
            run_index: 2,
        };

        let (verdict, record) = service
            .evaluate_requirement_instrumented(
                &requirement("REQ-1"),
                &filters,
                &DocumentContext::default(),
                &run,
            )
            .await
            .unwrap();

        assert_eq!(record.batch_id, "batch-7");
        assert_eq!(record.run_index, 2);
        assert_eq!(record.status_label, verdict.status.label());
        assert_eq!(record.document_id, "doc-1");
        assert!(record.raw_verdict.get("status").is_some());
    }

    #[tokio::test]
    async fn document_run_aggregates_summary() {
        let service = passing_service();
        let filters = SearchFilters::scope("doc-1", "org-1");
        let requirements = vec![requirement("REQ-1"), requirement("REQ-2")];

        let result = service
            .evaluate_document(&requirements, &filters, &DocumentContext::default())
            .await;

        assert_eq!(result.verdicts.len(), 2);
        assert!(!result.aborted);
        assert_eq!(result.summary.status_counts.get("PASS"), Some(&2));
        assert!((result.summary.compliance_score - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn circuit_breaker_skips_remaining_requirements() {
        let service = EvaluationService::new(
            Arc::new(StaticIndex {
                text: "Our risk management plan defines the scope of activities.".to_string(),
            }),
            Arc::new(StaticEmbeddings),
            Arc::new(StaticProvider {
                judgement: None, // every judgement call fails
                second_opinion_status: ExtractedStatus::Flagged,
            }),
            fast_limits(),
        );
        let filters = SearchFilters::scope("doc-1", "org-1");
        let requirements: Vec<Requirement> =
            (1..=5).map(|i| requirement(&format!("REQ-{}", i))).collect();

        let result = service
            .evaluate_document(&requirements, &filters, &DocumentContext::default())
            .await;

        assert!(result.aborted);
        assert_eq!(result.failures.len(), 2);
        assert_eq!(result.skipped.len(), 3);
        assert!(result.verdicts.is_empty());
        assert_eq!(result.summary.total_requirements, 5);
    }
}
