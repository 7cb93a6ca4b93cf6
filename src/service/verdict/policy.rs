//! Deterministic decision and confidence policy
//!
//! Applied on top of whatever the model claims; the model never gets the
//! last word on status or confidence.

use crate::model::{
    Coverage, EvidenceBundle, EvidenceStrength, EvidenceType, GapAnalysis, InterpretationRisk,
    Requirement, VerdictStatus,
};

/// Artifact count at which direct evidence counts as complete coverage.
const COMPLETE_COVERAGE_COUNT: usize = 3;
/// Artifact count at which any evidence counts as partial coverage.
const PARTIAL_COVERAGE_COUNT: usize = 2;

/// Enforce the citation rules on the model's status.
///
/// Returns the final status and an optional rationale note explaining a
/// downgrade.
pub fn apply_decision_policy(
    status: VerdictStatus,
    citation_count: usize,
    evidence_type: EvidenceType,
) -> (VerdictStatus, Option<String>) {
    match status {
        VerdictStatus::Pass if citation_count == 0 => (
            VerdictStatus::Flagged,
            Some(
                "Downgraded from PASS: the judgement provided no citations to support it."
                    .to_string(),
            ),
        ),
        VerdictStatus::Fail
            if citation_count == 0 && evidence_type != EvidenceType::Absent =>
        {
            (
                VerdictStatus::Flagged,
                Some(
                    "Downgraded from FAIL: evidence was retrieved but the judgement cited none of it."
                        .to_string(),
                ),
            )
        }
        other => (other, None),
    }
}

/// Coverage from the bundle alone.
pub fn coverage(bundle: &EvidenceBundle) -> Coverage {
    let direct = bundle.evidence_type == EvidenceType::Direct;
    if direct && bundle.artifacts.len() >= COMPLETE_COVERAGE_COUNT {
        Coverage::Complete
    } else if direct || bundle.artifacts.len() >= PARTIAL_COVERAGE_COUNT {
        Coverage::Partial
    } else {
        Coverage::Minimal
    }
}

/// How likely a human reviewer is to contest the verdict.
pub fn interpretation_risk(
    status: VerdictStatus,
    strength: EvidenceStrength,
    evidence_type: EvidenceType,
) -> InterpretationRisk {
    match status {
        VerdictStatus::Flagged => InterpretationRisk::High,
        VerdictStatus::Pass if strength == EvidenceStrength::Strong => InterpretationRisk::Low,
        VerdictStatus::Fail if evidence_type == EvidenceType::Absent => InterpretationRisk::Low,
        _ => InterpretationRisk::Medium,
    }
}

/// Build the FAIL gap analysis from requirement keywords and the bundle's
/// own gap list.
pub fn build_gap_analysis(requirement: &Requirement, bundle: &EvidenceBundle) -> GapAnalysis {
    let mut missing_elements = bundle.gaps.clone();

    let requirement_lower = requirement.text.to_lowercase();
    for hint in &requirement.evaluation_hints {
        let hint_lower = hint.to_lowercase();
        let covered = bundle
            .artifacts
            .iter()
            .any(|a| a.content.to_lowercase().contains(&hint_lower));
        if !covered && !missing_elements.iter().any(|m| m.contains(hint.as_str())) {
            missing_elements.push(format!("No evidence addressing \"{}\"", hint));
        }
    }

    let mut suggested_sections = Vec::new();
    if requirement_lower.contains("plan") {
        suggested_sections.push(format!(
            "A dedicated \"{}\" section referencing clause {}",
            requirement.title, requirement.clause
        ));
    } else {
        suggested_sections.push(format!(
            "A section addressing clause {} ({})",
            requirement.clause, requirement.title
        ));
    }

    let remediation_example = Some(format!(
        "Document how the organization satisfies clause {}: \"{}\". Include the expected {} \
         artifacts and reference them from the risk management file.",
        requirement.clause,
        requirement.title,
        requirement
            .typical_artifact_types
            .first()
            .map(|t| t.label())
            .unwrap_or("text"),
    ));

    GapAnalysis {
        missing_elements,
        suggested_sections,
        remediation_example,
    }
}
