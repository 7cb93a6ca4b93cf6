use crate::service::llm::JudgementError;

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    /// The model response stayed malformed or schema-invalid through
    /// retries. Surfaced to the caller; never replaced with a guessed
    /// status.
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),
}

impl From<JudgementError> for VerdictError {
    fn from(err: JudgementError) -> Self {
        VerdictError::EvaluationFailed(err.to_string())
    }
}
