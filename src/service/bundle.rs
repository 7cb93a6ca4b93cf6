//! Evidence bundle construction
//!
//! Converts scored retrieval candidates into a typed, classified bundle with
//! an identified-gaps list. Classification is a pure function of the
//! surviving artifacts' relevance scores and count.

use crate::model::{
    EvidenceArtifact, EvidenceBundle, EvidenceStrength, EvidenceType, Requirement,
    RetrievedCandidate,
};
use crate::service::relevance::score_candidate;

/// Candidates scoring at or below this are dropped from the bundle, but
/// still counted as considered.
pub const RELEVANCE_FLOOR: f64 = 0.3;
/// A single artifact above this makes the evidence direct and strong.
pub const DIRECT_THRESHOLD: f64 = 0.8;
/// All surviving scores below this add a weak-evidence gap.
const WEAK_EVIDENCE_CEILING: f64 = 0.6;
/// Surviving-artifact count that upgrades indirect evidence to moderate.
const MODERATE_COUNT: usize = 3;
/// Bundle cap; only the top artifacts reach the judgement prompt.
const MAX_ARTIFACTS: usize = 5;

/// Requirement-text keywords checked against surviving artifact content.
const EXPECTED_CONTENT_KEYWORDS: &[&str] = &["plan", "procedure", "record", "review", "criteria"];

#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub bundle: EvidenceBundle,
    /// Candidates examined, including those under the relevance floor.
    pub considered: usize,
}

/// Build the evidence bundle for one (requirement, document) evaluation.
pub fn build_bundle(
    requirement: &Requirement,
    document_id: &str,
    candidates: Vec<RetrievedCandidate>,
) -> BundleOutcome {
    let considered = candidates.len();

    let mut artifacts: Vec<EvidenceArtifact> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let outcome = score_candidate(requirement, &candidate);
            if outcome.score <= RELEVANCE_FLOOR {
                return None;
            }
            Some(EvidenceArtifact {
                artifact_type: candidate.artifact_type,
                page: candidate.page,
                section: candidate.section,
                region: candidate.region,
                content: candidate.text,
                relevance: outcome.score,
                matched_concepts: outcome.matched_concepts,
            })
        })
        .collect();

    artifacts.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    artifacts.truncate(MAX_ARTIFACTS);

    let (evidence_type, strength) = classify(&artifacts);
    let gaps = identify_gaps(requirement, &artifacts);

    tracing::debug!(
        requirement = %requirement.id,
        document = %document_id,
        considered = considered,
        surviving = artifacts.len(),
        evidence_type = ?evidence_type,
        strength = ?strength,
        gaps = gaps.len(),
        "Evidence bundle built"
    );

    BundleOutcome {
        bundle: EvidenceBundle {
            requirement_id: requirement.id.clone(),
            document_id: document_id.to_string(),
            evidence_type,
            strength,
            artifacts,
            gaps,
        },
        considered,
    }
}

/// Classify the bundle from its surviving artifacts. The four branches are
/// exhaustive and mutually exclusive, checked in order.
pub fn classify(artifacts: &[EvidenceArtifact]) -> (EvidenceType, EvidenceStrength) {
    if artifacts.is_empty() {
        (EvidenceType::Absent, EvidenceStrength::Weak)
    } else if artifacts.iter().any(|a| a.relevance > DIRECT_THRESHOLD) {
        (EvidenceType::Direct, EvidenceStrength::Strong)
    } else if artifacts.len() >= MODERATE_COUNT {
        (EvidenceType::Indirect, EvidenceStrength::Moderate)
    } else {
        (EvidenceType::Indirect, EvidenceStrength::Weak)
    }
}

/// Name expected-but-missing evidence for the bundle and the gap analysis.
pub fn identify_gaps(requirement: &Requirement, artifacts: &[EvidenceArtifact]) -> Vec<String> {
    let mut gaps = Vec::new();

    for expected in &requirement.typical_artifact_types {
        if !artifacts.iter().any(|a| a.artifact_type == *expected) {
            gaps.push(format!(
                "No {} evidence found; this clause typically provides one",
                expected.label()
            ));
        }
    }

    if !artifacts.is_empty()
        && artifacts
            .iter()
            .all(|a| a.relevance < WEAK_EVIDENCE_CEILING)
    {
        gaps.push("Only weak or indirect evidence located".to_string());
    }

    let requirement_lower = requirement.text.to_lowercase();
    for keyword in EXPECTED_CONTENT_KEYWORDS {
        if requirement_lower.contains(keyword)
            && !artifacts
                .iter()
                .any(|a| a.content.to_lowercase().contains(keyword))
        {
            gaps.push(format!(
                "Requirement calls for a {} but no retrieved evidence mentions one",
                keyword
            ));
        }
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactType, Priority, StrategyScores};

    fn requirement() -> Requirement {
        Requirement {
            id: "REQ-4.4-01".to_string(),
            clause: "4.4".to_string(),
            category: "planning".to_string(),
            title: "Risk management plan".to_string(),
            text: "A risk management plan shall be established and maintained.".to_string(),
            acceptance_criteria: "Plan exists".to_string(),
            priority: Priority::High,
            evaluation_hints: vec!["risk management plan".to_string()],
            typical_artifact_types: vec![ArtifactType::Text, ArtifactType::Table],
        }
    }

    fn artifact(relevance: f64) -> EvidenceArtifact {
        EvidenceArtifact {
            artifact_type: ArtifactType::Text,
            page: 1,
            section: None,
            region: None,
            content: "the risk management plan".to_string(),
            relevance,
            matched_concepts: Vec::new(),
        }
    }

    fn candidate(id: &str, text: &str, fused: f64) -> RetrievedCandidate {
        RetrievedCandidate {
            chunk_id: id.to_string(),
            document_id: "doc-1".to_string(),
            page: 1,
            section: None,
            region: None,
            artifact_type: ArtifactType::Text,
            text: text.to_string(),
            scores: StrategyScores::default(),
            fused_score: fused,
        }
    }

    #[test]
    fn one_strong_artifact_classifies_direct_strong() {
        let artifacts = vec![artifact(0.9), artifact(0.4)];
        assert_eq!(
            classify(&artifacts),
            (EvidenceType::Direct, EvidenceStrength::Strong)
        );
    }

    #[test]
    fn three_middling_artifacts_classify_indirect_moderate() {
        let artifacts = vec![artifact(0.5), artifact(0.55), artifact(0.6)];
        assert_eq!(
            classify(&artifacts),
            (EvidenceType::Indirect, EvidenceStrength::Moderate)
        );
    }

    #[test]
    fn no_surviving_artifacts_classify_absent_weak() {
        assert_eq!(
            classify(&[]),
            (EvidenceType::Absent, EvidenceStrength::Weak)
        );
    }

    #[test]
    fn few_weak_artifacts_classify_indirect_weak() {
        let artifacts = vec![artifact(0.5), artifact(0.4)];
        assert_eq!(
            classify(&artifacts),
            (EvidenceType::Indirect, EvidenceStrength::Weak)
        );
    }

    #[test]
    fn classification_is_total_and_exclusive() {
        let cases: Vec<Vec<EvidenceArtifact>> = vec![
            vec![],
            vec![artifact(0.31)],
            vec![artifact(0.81)],
            vec![artifact(0.5); 3],
            vec![artifact(0.5); 2],
            vec![artifact(0.9); 5],
        ];
        for artifacts in cases {
            let class = classify(&artifacts);
            let allowed = [
                (EvidenceType::Absent, EvidenceStrength::Weak),
                (EvidenceType::Direct, EvidenceStrength::Strong),
                (EvidenceType::Indirect, EvidenceStrength::Moderate),
                (EvidenceType::Indirect, EvidenceStrength::Weak),
            ];
            assert_eq!(allowed.iter().filter(|c| **c == class).count(), 1);
        }
    }

    #[test]
    fn low_scoring_candidates_are_dropped_but_counted() {
        let mut unrelated = candidate("c-2", "entirely unrelated content", 0.1);
        unrelated.artifact_type = ArtifactType::Figure;
        let outcome = build_bundle(
            &requirement(),
            "doc-1",
            vec![
                candidate("c-1", "the risk management plan, clause 4.4", 3.0),
                unrelated,
            ],
        );
        assert_eq!(outcome.considered, 2);
        assert_eq!(outcome.bundle.artifacts.len(), 1);
    }

    #[test]
    fn bundle_is_capped_and_sorted_by_relevance() {
        let candidates = (0..8)
            .map(|i| {
                candidate(
                    &format!("c-{}", i),
                    "risk management plan 4.4",
                    i as f64,
                )
            })
            .collect();
        let outcome = build_bundle(&requirement(), "doc-1", candidates);
        assert_eq!(outcome.bundle.artifacts.len(), 5);
        let scores: Vec<f64> = outcome.bundle.artifacts.iter().map(|a| a.relevance).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn gaps_name_missing_artifact_types() {
        let artifacts = vec![artifact(0.7)];
        let gaps = identify_gaps(&requirement(), &artifacts);
        assert!(gaps.iter().any(|g| g.contains("table")));
        assert!(!gaps.iter().any(|g| g.contains("No text evidence")));
    }

    #[test]
    fn all_weak_scores_add_weak_evidence_gap() {
        let artifacts = vec![artifact(0.4), artifact(0.5)];
        let gaps = identify_gaps(&requirement(), &artifacts);
        assert!(gaps.iter().any(|g| g.contains("weak or indirect")));
    }

    #[test]
    fn requirement_keyword_without_matching_content_adds_gap() {
        let mut art = artifact(0.7);
        art.content = "a table of hazards".to_string();
        let gaps = identify_gaps(&requirement(), &[art]);
        assert!(gaps.iter().any(|g| g.contains("calls for a plan")));
    }
}
