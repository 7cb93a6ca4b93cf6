//! Evidence-to-verdict engine for medical-device compliance evaluation.
//!
//! Evaluates documents against a catalogue of regulatory requirements and
//! produces one [`model::EvaluationVerdict`] per (document, requirement)
//! pair: a PASS/FAIL/FLAGGED/NOT_APPLICABLE status backed by verified
//! citations and deterministic confidence metrics.
//!
//! The pipeline per requirement:
//!
//! 1. [`service::FusionRetriever`] fans out to dense, keyword and
//!    semantic retrieval against an external chunk index and fuses the
//!    results into one ranked candidate list.
//! 2. [`service::bundle`] scores each candidate's relevance and builds a
//!    classified evidence bundle with an identified-gaps list.
//! 3. [`service::VerdictEngine`] obtains a structured judgement from the
//!    language model and applies conservative decision rules on top.
//! 4. [`service::citation`] verifies every quoted citation against the
//!    evidence actually supplied, repairing near-matches and zeroing
//!    fabrications.
//! 5. [`service::ConsensusReconciler`] requests a second independent
//!    judgement for high-interpretation-risk verdicts and reconciles
//!    disagreement without ever upgrading a status.
//!
//! [`service::repeatability`] runs out of band over logged
//! [`model::RunRecord`]s to measure how stable the evaluation process
//! itself is.
//!
//! Document extraction, persistence, embedding generation and any UI are
//! external collaborators; see [`search`] for the consumed interfaces.

pub mod error;
pub mod model;
pub mod search;
pub mod service;

pub use error::EngineError;
pub use model::EngineConfig;
pub use service::EvaluationService;
