//! Repeatability analysis over logged evaluation runs
//!
//! Pure, deterministic batch transforms: per-(batch, document, requirement)
//! modal verdict and repeatability fraction, and a two-batch stability
//! comparison. Recomputable on demand; never a source of truth.

use std::collections::BTreeMap;

use crate::model::{RepeatabilityDelta, RepeatabilityResult, RunRecord};

/// Tie-break order for modal-label selection, so equal counts always
/// resolve the same way.
pub const CANONICAL_LABEL_ORDER: [&str; 4] = ["PASS", "FAIL", "FLAGGED", "NOT_APPLICABLE"];

/// Aggregate run records into per-group repeatability results.
///
/// Groups with no records simply do not appear, so every result has
/// `total_runs >= 1` and repeatability in (0, 1].
pub fn analyze_runs(records: &[RunRecord]) -> Vec<RepeatabilityResult> {
    let mut groups: BTreeMap<(String, String, String), BTreeMap<String, usize>> = BTreeMap::new();

    for record in records {
        let key = (
            record.batch_id.clone(),
            record.document_id.clone(),
            record.requirement_id.clone(),
        );
        *groups
            .entry(key)
            .or_default()
            .entry(record.status_label.clone())
            .or_default() += 1;
    }

    groups
        .into_iter()
        .map(|((batch_id, document_id, requirement_id), counts)| {
            let total_runs: usize = counts.values().sum();
            let (modal_label, modal_count) = modal_label(&counts);
            RepeatabilityResult {
                batch_id,
                document_id,
                requirement_id,
                modal_label,
                repeatability: modal_count as f64 / total_runs as f64,
                total_runs,
            }
        })
        .collect()
}

/// Join two batches' results by (document, requirement) and compute the
/// stability delta (candidate − baseline). Pairs missing from either batch
/// are skipped; a delta needs both measurements.
pub fn compare_batches(
    baseline: &[RepeatabilityResult],
    candidate: &[RepeatabilityResult],
) -> Vec<RepeatabilityDelta> {
    let baseline_by_pair: BTreeMap<(String, String), f64> = baseline
        .iter()
        .map(|r| {
            (
                (r.document_id.clone(), r.requirement_id.clone()),
                r.repeatability,
            )
        })
        .collect();

    candidate
        .iter()
        .filter_map(|r| {
            let key = (r.document_id.clone(), r.requirement_id.clone());
            baseline_by_pair.get(&key).map(|&base| RepeatabilityDelta {
                document_id: r.document_id.clone(),
                requirement_id: r.requirement_id.clone(),
                baseline: base,
                candidate: r.repeatability,
                delta: r.repeatability - base,
            })
        })
        .collect()
}

/// Pick the most frequent label; ties resolve in canonical status order,
/// with any non-canonical labels after, in lexicographic order.
fn modal_label(counts: &BTreeMap<String, usize>) -> (String, usize) {
    let max_count = counts.values().copied().max().unwrap_or(0);

    for label in CANONICAL_LABEL_ORDER {
        if counts.get(label).copied() == Some(max_count) {
            return (label.to_string(), max_count);
        }
    }
    // BTreeMap iteration keeps this branch deterministic too.
    counts
        .iter()
        .find(|(_, &count)| count == max_count)
        .map(|(label, &count)| (label.clone(), count))
        .unwrap_or_default()
}
