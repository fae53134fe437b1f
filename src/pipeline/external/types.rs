use serde::{Deserialize, Serialize};

use super::ExternalError;
use crate::models::enums::EntrustmentLevel;

/// Chat-model client abstraction (allows mocking).
pub trait LlmClient {
    /// Send one system + user message pair and return the reply text.
    fn generate(&self, system: &str, prompt: &str) -> Result<String, ExternalError>;

    fn model_name(&self) -> &str;
}

/// Schema-checked analysis returned by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub insufficient_evidence: bool,
    pub insufficient_reason: Option<String>,
    pub primary_epa_id: Option<String>,
    pub secondary_epa_ids: Vec<String>,
    pub epa_confidence: f64,
    pub epa_rationale: String,
    pub entrustment_level: EntrustmentLevel,
    pub entrustment_confidence: f64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub next_steps: Vec<String>,
    pub evidence_quotes: Vec<String>,
    pub summary_comment: String,
}
