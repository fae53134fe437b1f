use super::parser::parse_analysis_response;
use super::prompt::{build_analysis_prompt, ANALYSIS_SYSTEM_PROMPT};
use super::sanitize::sanitize_for_llm;
use super::types::{AnalysisResponse, LlmClient};
use super::validation::{verify_analysis, VerifiedAnalysis};
use super::ExternalError;
use crate::catalog::CategoryCatalog;

/// Extra attempts after the first call fails with a retryable or parse error.
const MAX_LLM_RETRIES: usize = 1;

/// Runs one transcript through the external collaborator:
/// sanitize → prompt → LLM → parse → verify.
pub struct ExternalAnalyzer {
    llm: Box<dyn LlmClient + Send + Sync>,
}

impl ExternalAnalyzer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Analyze a de-identified transcript. Verification runs against the
    /// same sanitized text the model saw.
    pub fn analyze(
        &self,
        transcript: &str,
        context: Option<&str>,
        catalog: &CategoryCatalog,
    ) -> Result<VerifiedAnalysis, ExternalError> {
        let _span = tracing::info_span!("external_analysis", model = %self.llm.model_name()).entered();

        let sanitized = sanitize_for_llm(transcript);
        let context = context.map(sanitize_for_llm);
        let prompt = build_analysis_prompt(&sanitized, context.as_deref(), catalog);

        let analysis = self.call_llm_with_retry(&prompt)?;
        Ok(verify_analysis(analysis, catalog, &sanitized))
    }

    /// Call the model and parse its reply, retrying once on transport or
    /// parse failures.
    fn call_llm_with_retry(&self, prompt: &str) -> Result<AnalysisResponse, ExternalError> {
        let mut attempt = 0;
        loop {
            let result = self
                .llm
                .generate(ANALYSIS_SYSTEM_PROMPT, prompt)
                .and_then(|reply| parse_analysis_response(&reply));

            match result {
                Ok(analysis) => return Ok(analysis),
                Err(e) if (e.is_retryable() || e.is_parse_error()) && attempt < MAX_LLM_RETRIES => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        error_kind = e.kind(),
                        "External analysis failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
