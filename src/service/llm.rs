//! Language-model collaborator
//!
//! One trait seam for both the primary judgement and the second-opinion
//! call, so decision and reconciliation policy stay testable without a
//! model. The production implementation drives OpenAI through rig's
//! structured extractors.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::providers::openai;

use crate::model::{ExtractedJudgement, ExtractedSecondOpinion};

/// Environment variable for the primary evaluation model.
const ENV_EVALUATION_MODEL: &str = "CONFORMA_EVALUATION_MODEL";
/// Environment variable for the second-opinion model; defaults to a smaller
/// model than the primary so the two reads stay independent and cheap.
const ENV_SECOND_OPINION_MODEL: &str = "CONFORMA_SECOND_OPINION_MODEL";

const DEFAULT_EVALUATION_MODEL: &str = openai::GPT_4O;
const DEFAULT_SECOND_OPINION_MODEL: &str = openai::GPT_4O_MINI;

#[derive(Debug, thiserror::Error)]
pub enum JudgementError {
    #[error("failed to initialize model client: {0}")]
    ClientInit(String),

    /// The model call failed or its output did not satisfy the schema.
    #[error("model call failed: {0}")]
    Model(String),
}

/// A structured judgement plus what it cost.
#[derive(Debug, Clone)]
pub struct JudgementResponse {
    pub judgement: ExtractedJudgement,
    /// Estimated when the provider does not report usage.
    pub tokens_used: u32,
}

#[async_trait]
pub trait JudgementProvider: Send + Sync {
    /// Primary structured judgement for one requirement.
    async fn judge(&self, system: &str, prompt: &str)
        -> Result<JudgementResponse, JudgementError>;

    /// Independent second opinion for consensus reconciliation.
    async fn second_opinion(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<ExtractedSecondOpinion, JudgementError>;

    /// Identifier of the primary model, recorded in verdict metadata.
    fn model_id(&self) -> &str;
}

/// OpenAI-backed provider. Both calls run with temperature 0.0 and a fixed
/// seed for deterministic-leaning output.
pub struct OpenAiJudgementProvider {
    client: openai::Client,
    evaluation_model: String,
    second_opinion_model: String,
}

impl OpenAiJudgementProvider {
    pub fn new(api_key: &str) -> Result<Self, JudgementError> {
        let client = openai::Client::new(api_key);

        let evaluation_model = std::env::var(ENV_EVALUATION_MODEL)
            .unwrap_or_else(|_| DEFAULT_EVALUATION_MODEL.to_string());
        let second_opinion_model = std::env::var(ENV_SECOND_OPINION_MODEL)
            .unwrap_or_else(|_| DEFAULT_SECOND_OPINION_MODEL.to_string());

        tracing::info!(
            evaluation_model = %evaluation_model,
            second_opinion_model = %second_opinion_model,
            "Judgement provider initialized"
        );

        Ok(Self {
            client,
            evaluation_model,
            second_opinion_model,
        })
    }

    fn deterministic_params() -> serde_json::Value {
        serde_json::json!({
            "temperature": 0.0,
            "seed": 42
        })
    }
}

#[async_trait]
impl JudgementProvider for OpenAiJudgementProvider {
    async fn judge(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<JudgementResponse, JudgementError> {
        let start_time = std::time::Instant::now();

        let extractor = self
            .client
            .extractor::<ExtractedJudgement>(&self.evaluation_model)
            .preamble(system)
            .additional_params(Self::deterministic_params())
            .build();

        match extractor.extract(prompt).await {
            Ok(judgement) => {
                let elapsed = start_time.elapsed();
                tracing::info!(
                    model = %self.evaluation_model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    prompt_length = prompt.len(),
                    citations = judgement.citations.len(),
                    "Judgement call completed"
                );
                // The extractor API does not expose provider usage; estimate
                // from character counts.
                let response_len = serde_json::to_string(&judgement)
                    .map(|s| s.len())
                    .unwrap_or(0);
                let tokens_used = ((prompt.len() + response_len) / 4) as u32;
                Ok(JudgementResponse {
                    judgement,
                    tokens_used,
                })
            }
            Err(e) => {
                let elapsed = start_time.elapsed();
                tracing::error!(
                    model = %self.evaluation_model,
                    elapsed_ms = elapsed.as_millis() as u64,
                    prompt_length = prompt.len(),
                    error = %e,
                    "Judgement call failed"
                );
                Err(JudgementError::Model(e.to_string()))
            }
        }
    }

    async fn second_opinion(
        &self,
        system: &str,
        prompt: &str,
    ) -> Result<ExtractedSecondOpinion, JudgementError> {
        let extractor = self
            .client
            .extractor::<ExtractedSecondOpinion>(&self.second_opinion_model)
            .preamble(system)
            .additional_params(Self::deterministic_params())
            .build();

        extractor.extract(prompt).await.map_err(|e| {
            tracing::error!(
                model = %self.second_opinion_model,
                error = %e,
                "Second-opinion call failed"
            );
            JudgementError::Model(e.to_string())
        })
    }

    fn model_id(&self) -> &str {
        &self.evaluation_model
    }
}
