//! Key-phrase extraction for keyword queries

use std::collections::HashSet;

use regex::Regex;
use std::sync::OnceLock;

use crate::model::Requirement;

/// Regulatory vocabulary matched verbatim (case-insensitive) in requirement
/// text before falling back to generic extraction.
const DOMAIN_TERMS: &[&str] = &[
    "risk management plan",
    "risk management file",
    "risk management process",
    "risk analysis",
    "risk evaluation",
    "risk control",
    "risk acceptability",
    "risk criteria",
    "residual risk",
    "overall residual risk",
    "benefit-risk analysis",
    "hazardous situation",
    "hazard",
    "intended use",
    "post-production monitoring",
    "production and post-production",
    "top management",
    "management review",
    "competence",
    "verification",
    "validation",
    "effectiveness",
    "traceability",
    "design review",
    "change control",
    "procedure",
    "policy",
    "training",
    "control measure",
];

/// Words too common to carry retrieval signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "any", "are", "as", "at", "be", "been", "by", "for", "from", "has", "have",
    "in", "is", "it", "its", "must", "no", "not", "of", "on", "or", "shall", "should", "such",
    "that", "the", "their", "this", "to", "was", "were", "when", "where", "which", "will", "with",
];

const MAX_PHRASES: usize = 10;
const MAX_QUERY_LEN: usize = 300;

fn quoted_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid regex"))
}

fn paren_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]+)\)").expect("valid regex"))
}

fn acronym_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,10}\b").expect("valid regex"))
}

/// Extract key phrases from a requirement for the keyword query variant.
///
/// Sources, in priority order: regulatory vocabulary hits, quoted phrases,
/// short parenthesised phrases, capitalised acronyms, and stop-word-filtered
/// bigrams from the requirement text.
pub fn extract_key_phrases(requirement: &Requirement) -> Vec<String> {
    let combined = format!(
        "{} {} {}",
        requirement.title, requirement.text, requirement.acceptance_criteria
    );
    let combined_lower = combined.to_lowercase();

    let mut seen: HashSet<String> = HashSet::new();
    let mut phrases: Vec<String> = Vec::new();

    let push = |phrase: &str, seen: &mut HashSet<String>, phrases: &mut Vec<String>| {
        let trimmed = phrase.trim();
        if trimmed.is_empty() {
            return;
        }
        if seen.insert(trimmed.to_lowercase()) {
            phrases.push(trimmed.to_string());
        }
    };

    for term in DOMAIN_TERMS {
        if combined_lower.contains(term) {
            push(term, &mut seen, &mut phrases);
        }
    }

    for capture in quoted_pattern().captures_iter(&combined) {
        push(&capture[1], &mut seen, &mut phrases);
    }

    for capture in paren_pattern().captures_iter(&combined) {
        if capture[1].len() < 50 {
            push(&capture[1], &mut seen, &mut phrases);
        }
    }

    for m in acronym_pattern().find_iter(&combined) {
        push(m.as_str(), &mut seen, &mut phrases);
    }

    for bigram in content_bigrams(&combined_lower) {
        if phrases.len() >= MAX_PHRASES {
            break;
        }
        push(&bigram, &mut seen, &mut phrases);
    }

    phrases.truncate(MAX_PHRASES);
    phrases
}

/// Build the keyword query from evaluation hints plus extracted key phrases,
/// bounded to the index's query-length limit.
pub fn build_keyword_query(requirement: &Requirement) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut terms: Vec<String> = Vec::new();

    for hint in &requirement.evaluation_hints {
        let trimmed = hint.trim();
        if !trimmed.is_empty() && seen.insert(trimmed.to_lowercase()) {
            terms.push(trimmed.to_string());
        }
    }
    for phrase in extract_key_phrases(requirement) {
        if seen.insert(phrase.to_lowercase()) {
            terms.push(phrase);
        }
    }

    let mut query = terms.join(" ");
    if query.len() > MAX_QUERY_LEN {
        query.truncate(MAX_QUERY_LEN);
        if let Some(cut) = query.rfind(' ') {
            query.truncate(cut);
        }
    }
    query
}

fn content_bigrams(text: &str) -> Vec<String> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .collect();

    words
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactType, Priority};

    fn requirement(text: &str) -> Requirement {
        Requirement {
            id: "REQ-4.4-01".to_string(),
            clause: "4.4".to_string(),
            category: "planning".to_string(),
            title: "Risk management plan".to_string(),
            text: text.to_string(),
            acceptance_criteria: "A documented plan exists".to_string(),
            priority: Priority::High,
            evaluation_hints: vec!["risk management plan".to_string(), "scope".to_string()],
            typical_artifact_types: vec![ArtifactType::Text],
        }
    }

    #[test]
    fn picks_up_domain_terms_and_acronyms() {
        let req = requirement(
            "The manufacturer shall establish a risk management plan (RMP) covering verification activities.",
        );
        let phrases = extract_key_phrases(&req);
        assert!(phrases.iter().any(|p| p == "risk management plan"));
        assert!(phrases.iter().any(|p| p == "verification"));
        assert!(phrases.iter().any(|p| p == "RMP"));
    }

    #[test]
    fn extracts_quoted_phrases() {
        let req = requirement("The file shall reference the \"criteria for risk acceptability\".");
        let phrases = extract_key_phrases(&req);
        assert!(phrases.iter().any(|p| p == "criteria for risk acceptability"));
    }

    #[test]
    fn bigrams_skip_stop_words() {
        let req = requirement("The device shall document residual dangers thoroughly.");
        let phrases = extract_key_phrases(&req);
        assert!(phrases.iter().all(|p| !p.starts_with("the ")));
    }

    #[test]
    fn keyword_query_dedupes_hints_and_respects_length_cap() {
        let req = requirement("The plan shall define scope.");
        let query = build_keyword_query(&req);
        assert!(query.len() <= MAX_QUERY_LEN);
        let first = query.find("risk management plan").unwrap();
        assert_eq!(query.rfind("risk management plan").unwrap(), first);
    }

    #[test]
    fn phrase_count_is_capped() {
        let req = requirement(
            "hazard analysis covers probability severity occurrence harm detection mitigation \
             monitoring production distribution installation servicing decommissioning disposal",
        );
        assert!(extract_key_phrases(&req).len() <= MAX_PHRASES);
    }
}
