//! Citation verification and repair
//!
//! Every quote in a verdict must be traceable to the evidence actually
//! supplied to the model. Near-matches are repaired to the real substring;
//! everything else is marked unverifiable and pulls the verdict down.

use crate::model::{EvaluationVerdict, EvidenceBundle, VerdictStatus};

/// Minimum similarity for a fuzzy match to count as verified.
const SIMILARITY_THRESHOLD: f64 = 0.8;
/// Candidate alignment windows may differ from the quote by this many words.
const WINDOW_SLACK: usize = 2;
/// Windows sharing less than this fraction of the quote's words are not
/// worth an edit-distance pass.
const MIN_WORD_OVERLAP: f64 = 0.5;

/// Outcome of matching one quote against the bundle's texts.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMatch {
    pub verified: bool,
    /// The actual matched substring when the quote needed repair.
    pub repaired: Option<String>,
    pub similarity: f64,
}

/// Result of verifying all citations of one verdict.
#[derive(Debug, Clone, Default)]
pub struct CitationReport {
    pub total: usize,
    pub repaired: usize,
    pub unverifiable: usize,
    /// True when the verdict status was downgraded because every citation
    /// was unverifiable.
    pub downgraded: bool,
}

/// Match a quote against candidate texts.
///
/// A whitespace-normalized verbatim hit verifies at similarity 1.0 with no
/// repair. Otherwise the quote is aligned against word windows of each text
/// and the best window above [`SIMILARITY_THRESHOLD`] becomes the repaired
/// quote.
pub fn verify_quote(quote: &str, texts: &[&str]) -> QuoteMatch {
    let needle = normalize_whitespace(quote);
    if needle.is_empty() {
        return QuoteMatch {
            verified: false,
            repaired: None,
            similarity: 0.0,
        };
    }

    for text in texts {
        if normalize_whitespace(text).contains(&needle) {
            return QuoteMatch {
                verified: true,
                repaired: None,
                similarity: 1.0,
            };
        }
    }

    let mut best_similarity = 0.0;
    let mut best_window: Option<String> = None;
    for text in texts {
        if let Some((similarity, window)) = best_window_match(&needle, text) {
            if similarity > best_similarity {
                best_similarity = similarity;
                best_window = Some(window);
            }
        }
    }

    if best_similarity >= SIMILARITY_THRESHOLD {
        QuoteMatch {
            verified: true,
            repaired: best_window,
            similarity: best_similarity,
        }
    } else {
        QuoteMatch {
            verified: false,
            repaired: None,
            similarity: best_similarity,
        }
    }
}

/// Verify every citation of a verdict against its bundle, repairing or
/// zeroing in place. A verdict whose citations are all unverifiable is
/// downgraded one step toward FLAGGED (FAIL stays, it needs no citations).
pub fn verify_citations(verdict: &mut EvaluationVerdict, bundle: &EvidenceBundle) -> CitationReport {
    let texts: Vec<&str> = bundle.artifacts.iter().map(|a| a.content.as_str()).collect();

    let mut report = CitationReport {
        total: verdict.citations.len(),
        ..CitationReport::default()
    };

    for citation in &mut verdict.citations {
        let outcome = verify_quote(&citation.quote, &texts);
        if outcome.verified {
            if let Some(repaired) = outcome.repaired {
                tracing::debug!(
                    requirement = %verdict.requirement_id,
                    similarity = outcome.similarity,
                    "Repaired near-match citation quote"
                );
                citation.quote = repaired;
                report.repaired += 1;
            }
        } else {
            tracing::warn!(
                requirement = %verdict.requirement_id,
                similarity = outcome.similarity,
                quote = %citation.quote.chars().take(80).collect::<String>(),
                "Citation quote not found in supplied evidence"
            );
            citation.confidence = 0.0;
            report.unverifiable += 1;
        }
    }

    if report.unverifiable > 0 {
        verdict.rationale.push_str(&format!(
            "\n\nNote: {} citation(s) could not be located in the retrieved evidence.",
            report.unverifiable
        ));
    }

    if report.total > 0
        && report.unverifiable == report.total
        && verdict.status == VerdictStatus::Pass
    {
        verdict.status = VerdictStatus::Flagged;
        verdict
            .rationale
            .push_str("\n\nNote: downgraded from PASS because no citation could be verified.");
        report.downgraded = true;
    }

    report
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Align the quote against word windows of `haystack` and score each window
/// by normalized edit distance, returning the best.
fn best_window_match(needle: &str, haystack: &str) -> Option<(f64, String)> {
    let needle_lower = needle.to_lowercase();
    let needle_words: Vec<String> = needle_lower.split_whitespace().map(str::to_string).collect();
    let words: Vec<&str> = haystack.split_whitespace().collect();
    if needle_words.is_empty() || words.is_empty() {
        return None;
    }

    let min_width = needle_words.len().saturating_sub(WINDOW_SLACK).max(1);
    let max_width = (needle_words.len() + WINDOW_SLACK).min(words.len());

    let mut best: Option<(f64, String)> = None;
    for width in min_width..=max_width {
        for start in 0..=(words.len() - width) {
            let window_words = &words[start..start + width];
            if word_overlap(&needle_words, window_words) < MIN_WORD_OVERLAP {
                continue;
            }
            let window = window_words.join(" ");
            let similarity = similarity_ratio(&needle_lower, &window.to_lowercase());
            if best.as_ref().map(|(b, _)| similarity > *b).unwrap_or(true) {
                best = Some((similarity, window));
            }
        }
    }
    best
}

/// Fraction of the quote's words present in the window, punctuation
/// stripped.
fn word_overlap(needle_words: &[String], window_words: &[&str]) -> f64 {
    let window_normalized: Vec<String> = window_words
        .iter()
        .map(|w| normalize_word(w))
        .collect();
    let matched = needle_words
        .iter()
        .filter(|w| window_normalized.contains(&normalize_word(w)))
        .count();
    matched as f64 / needle_words.len() as f64
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}

/// 1 − edit distance / longer length, in [0, 1].
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let max_len = a_len.max(b_len);
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != b_char);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
