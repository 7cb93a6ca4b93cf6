//! Unified engine error handling
//!
//! Per-requirement failures surface as one of these; the calling layer
//! records them as explicit error outcomes rather than guessed statuses.

use crate::service::retrieval::RetrievalError;
use crate::service::verdict::VerdictError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The chunk index or embedding service stayed unreachable through
    /// bounded retries. "Could not check" is distinct from "evidence
    /// absent".
    #[error("retrieval unavailable: {0}")]
    RetrievalUnavailable(#[from] RetrievalError),

    /// The model response stayed malformed or schema-invalid through
    /// bounded retries.
    #[error("{0}")]
    EvaluationFailed(#[from] VerdictError),
}
