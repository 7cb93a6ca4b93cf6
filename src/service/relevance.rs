//! Relevance scoring for retrieval candidates
//!
//! Pure scoring of one candidate against one requirement; the bundle builder
//! applies the threshold and classification on top.

use crate::model::{Requirement, RetrievedCandidate};

/// Bonus per evaluation hint found in the candidate text.
const HINT_BONUS: f64 = 0.2;
/// Bonus when the candidate's artifact type is typical for the requirement.
const ARTIFACT_TYPE_BONUS: f64 = 0.3;
/// Bonus when the clause label appears verbatim in the candidate text.
const CLAUSE_BONUS: f64 = 0.3;
/// The fused retrieval score contributes `fused / 10`, capped here.
const RETRIEVAL_CONTRIBUTION_CAP: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct RelevanceOutcome {
    /// Final score, clamped to [0, 1].
    pub score: f64,
    /// Hints and clause references that matched, for auditability.
    pub matched_concepts: Vec<String>,
}

/// Score one candidate against a requirement.
pub fn score_candidate(requirement: &Requirement, candidate: &RetrievedCandidate) -> RelevanceOutcome {
    let text_lower = candidate.text.to_lowercase();

    let mut score = 0.0;
    let mut matched_concepts = Vec::new();

    for hint in &requirement.evaluation_hints {
        let hint_lower = hint.to_lowercase();
        if !hint_lower.is_empty() && text_lower.contains(&hint_lower) {
            score += HINT_BONUS;
            matched_concepts.push(hint.clone());
        }
    }

    if requirement
        .typical_artifact_types
        .contains(&candidate.artifact_type)
    {
        score += ARTIFACT_TYPE_BONUS;
    }

    if candidate.text.contains(&requirement.clause) {
        score += CLAUSE_BONUS;
        matched_concepts.push(format!("clause {}", requirement.clause));
    }

    score += (candidate.fused_score / 10.0).min(RETRIEVAL_CONTRIBUTION_CAP);

    RelevanceOutcome {
        score: score.min(1.0),
        matched_concepts,
    }
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
            text: "A risk management plan shall be established.".to_string(),
            acceptance_criteria: "Plan exists with scope and criteria".to_string(),
            priority: Priority::High,
            evaluation_hints: vec![
                "risk management plan".to_string(),
                "scope".to_string(),
                "acceptability criteria".to_string(),
            ],
            typical_artifact_types: vec![ArtifactType::Text, ArtifactType::Table],
        }
    }

    fn candidate(text: &str, artifact_type: ArtifactType, fused: f64) -> RetrievedCandidate {
        RetrievedCandidate {
            chunk_id: "c-1".to_string(),
            document_id: "doc-1".to_string(),
            page: 3,
            section: None,
            region: None,
            artifact_type,
            text: text.to_string(),
            scores: StrategyScores::default(),
            fused_score: fused,
        }
    }

    #[test]
    fn scores_hint_and_type_and_clause_bonuses() {
        let c = candidate(
            "Section 4.4: the Risk Management Plan defines the scope of activities.",
            ArtifactType::Text,
            2.0,
        );
        let outcome = score_candidate(&requirement(), &c);
        // 0.2 (plan hint) + 0.2 (scope hint) + 0.3 (type) + 0.3 (clause) + 0.2 (fused/10)
        assert!((outcome.score - 1.0).abs() < 1e-9);
        assert!(outcome.matched_concepts.contains(&"scope".to_string()));
        assert!(outcome.matched_concepts.contains(&"clause 4.4".to_string()));
    }

    #[test]
    fn hint_matching_is_case_insensitive() {
        let c = candidate("RISK MANAGEMENT PLAN overview", ArtifactType::Figure, 0.0);
        let outcome = score_candidate(&requirement(), &c);
        assert!((outcome.score - HINT_BONUS).abs() < 1e-9);
    }

    #[test]
    fn retrieval_contribution_is_capped() {
        let c = candidate("unrelated content", ArtifactType::Figure, 50.0);
        let outcome = score_candidate(&requirement(), &c);
        assert!((outcome.score - RETRIEVAL_CONTRIBUTION_CAP).abs() < 1e-9);
    }

    #[test]
    fn total_score_is_clamped_to_one() {
        let c = candidate(
            "4.4 risk management plan scope acceptability criteria",
            ArtifactType::Table,
            50.0,
        );
        let outcome = score_candidate(&requirement(), &c);
        assert_eq!(outcome.score, 1.0);
    }
}
