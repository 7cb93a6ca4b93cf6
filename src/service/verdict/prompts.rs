//! Prompts for requirement judgement

use crate::model::{DocumentContext, EvidenceBundle, Requirement};

/// System prompt for the primary judgement call.
pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are an expert compliance auditor evaluating medical device documentation against regulatory requirements.

Your task is to determine whether a specific requirement is satisfied based strictly on the evidence provided.

Evaluation criteria:
- PASS: clear, direct evidence that fully addresses the requirement
- FAIL: required evidence is missing or directly contradicted
- FLAGGED: evidence is partial, ambiguous, or genuinely uncertain
- NOT_APPLICABLE: the requirement does not apply to this document or device type

You must:
- Cite short verbatim quotes with page references for every conclusion
- Base conclusions only on the supplied evidence and document context
- Be conservative: prefer FLAGGED over PASS when uncertain
- Consider patient safety implications

Do not:
- Invent evidence or paraphrase quotes
- Treat the absence of retrieved evidence as proof of compliance

Your output must be structured JSON only and conform to the requested schema."#;

/// Build the judgement prompt from the requirement, the evidence bundle and
/// the document-level context flags.
pub fn build_evaluation_prompt(
    requirement: &Requirement,
    bundle: &EvidenceBundle,
    context: &DocumentContext,
) -> String {
    let mut sections = Vec::new();

    sections.push(format!(
        "# Requirement Evaluation\n\n\
         ## Requirement: {}\n\
         Clause: {}\n\
         Category: {}\n\
         Title: {}\n\
         Requirement text: {}\n\
         Acceptance criteria: {}\n\
         Typical evidence artifacts: {}",
        requirement.id,
        requirement.clause,
        requirement.category,
        requirement.title,
        requirement.text,
        requirement.acceptance_criteria,
        requirement
            .typical_artifact_types
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(", "),
    ));

    let mut context_lines = vec![format!("Document: {}", context.document_name)];
    if let Some(ref document_type) = context.document_type {
        context_lines.push(format!("Type: {}", document_type));
    }
    for (flag, value) in &context.flags {
        context_lines.push(format!("{}: {}", flag, value));
    }
    if let Some(ref summary) = context.summary {
        context_lines.push(format!("Summary: {}", summary));
    }
    sections.push(format!("## Document Context\n{}", context_lines.join("\n")));

    if bundle.artifacts.is_empty() {
        sections.push(
            "## Evidence Found\nNo relevant evidence was retrieved from the document.".to_string(),
        );
    } else {
        let mut evidence = String::from("## Evidence Found");
        for (i, artifact) in bundle.artifacts.iter().enumerate() {
            evidence.push_str(&format!(
                "\n\n### Evidence {} ({})\nPage: {}\nSection: {}\nRelevance: {:.2}\n```\n{}\n```",
                i + 1,
                artifact.artifact_type.label(),
                artifact.page,
                artifact.section.as_deref().unwrap_or("n/a"),
                artifact.relevance,
                artifact.content,
            ));
        }
        sections.push(evidence);
    }

    if !bundle.gaps.is_empty() {
        sections.push(format!(
            "## Known Evidence Gaps\n{}",
            bundle
                .gaps
                .iter()
                .map(|g| format!("- {}", g))
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }

    sections.push(
        "## Method\n\
         1. Evaluate each acceptance criterion against the evidence above.\n\
         2. Quote the exact supporting text with its page number for every citation.\n\
         3. Use PASS only when every criterion is clearly satisfied with explicit evidence, \
         FAIL when evidence is clearly missing or contradictory, and FLAGGED only when the \
         evidence is partial or genuinely uncertain.\n\
         4. Confirm that the final status reflects the strength of the evidence."
            .to_string(),
    );

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ArtifactType, EvidenceArtifact, EvidenceStrength, EvidenceType, Priority,
    };
    use std::collections::BTreeMap;

    #[test]
    fn prompt_includes_requirement_evidence_and_context_flags() {
        let requirement = Requirement {
            id: "REQ-4.4-01".to_string(),
            clause: "4.4".to_string(),
            category: "planning".to_string(),
            title: "Risk management plan".to_string(),
            text: "A plan shall exist.".to_string(),
            acceptance_criteria: "Plan with scope".to_string(),
            priority: Priority::High,
            evaluation_hints: vec![],
            typical_artifact_types: vec![ArtifactType::Text],
        };
        let bundle = EvidenceBundle {
            requirement_id: "REQ-4.4-01".to_string(),
            document_id: "doc-1".to_string(),
            evidence_type: EvidenceType::Direct,
            strength: EvidenceStrength::Strong,
            artifacts: vec![EvidenceArtifact {
                artifact_type: ArtifactType::Text,
                page: 12,
                section: Some("4 Planning".to_string()),
                region: None,
                content: "The risk management plan defines scope.".to_string(),
                relevance: 0.9,
                matched_concepts: vec![],
            }],
            gaps: vec!["No table evidence found".to_string()],
        };
        let mut flags = BTreeMap::new();
        flags.insert("mentions risk management plan".to_string(), true);
        let context = DocumentContext {
            document_name: "RM Plan.pdf".to_string(),
            document_type: Some("SOP".to_string()),
            flags,
            summary: None,
        };

        let prompt = build_evaluation_prompt(&requirement, &bundle, &context);
        assert!(prompt.contains("REQ-4.4-01"));
        assert!(prompt.contains("Page: 12"));
        assert!(prompt.contains("mentions risk management plan: true"));
        assert!(prompt.contains("No table evidence found"));
    }

    #[test]
    fn empty_bundle_states_no_evidence() {
        let requirement = Requirement {
            id: "REQ-1".to_string(),
            clause: "5.1".to_string(),
            category: "analysis".to_string(),
            title: "Risk analysis".to_string(),
            text: "Analysis shall be recorded.".to_string(),
            acceptance_criteria: "Records exist".to_string(),
            priority: Priority::Medium,
            evaluation_hints: vec![],
            typical_artifact_types: vec![],
        };
        let bundle = EvidenceBundle {
            requirement_id: "REQ-1".to_string(),
            document_id: "doc-1".to_string(),
            evidence_type: EvidenceType::Absent,
            strength: EvidenceStrength::Weak,
            artifacts: vec![],
            gaps: vec![],
        };
        let prompt =
            build_evaluation_prompt(&requirement, &bundle, &DocumentContext::default());
        assert!(prompt.contains("No relevant evidence was retrieved"));
    }
}
