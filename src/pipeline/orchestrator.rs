use std::sync::Arc;

use serde::Serialize;

use super::analysis::{
    assess_adequacy, build_draft, enforce_evidence_invariant, infer_entrustment,
    insufficient_draft, match_category, AdequacyAssessment,
};
use super::external::ExternalAnalyzer;
use super::redaction::{deidentify, DeidentificationResult};
use crate::catalog::CategoryCatalog;
use crate::models::draft::FeedbackDraft;
use crate::models::enums::DraftMethod;

/// Everything produced for one transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftOutcome {
    pub deidentification: DeidentificationResult,
    pub adequacy: AdequacyAssessment,
    pub draft: FeedbackDraft,
    /// Set when the external path was attempted and failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_error: Option<String>,
}

impl DraftOutcome {
    pub fn method(&self) -> DraftMethod {
        self.draft.meta.method
    }

    pub fn category_confidence(&self) -> f64 {
        self.draft.meta.category_confidence.unwrap_or(0.0)
    }

    pub fn entrustment_confidence(&self) -> f64 {
        self.draft.meta.entrustment_confidence.unwrap_or(0.0)
    }
}

/// Sequences the pipeline for one transcript:
/// redact → adequacy gate → (external | rule-based) → evidence invariant.
///
/// Holds only immutable state, so one instance serves concurrent requests.
pub struct DraftPipeline {
    catalog: Arc<CategoryCatalog>,
    external: Option<ExternalAnalyzer>,
}

impl DraftPipeline {
    pub fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self {
            catalog,
            external: None,
        }
    }

    pub fn with_external(mut self, analyzer: ExternalAnalyzer) -> Self {
        self.external = Some(analyzer);
        self
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Produce a draft for a raw transcript. Never fails: every input yields
    /// a well-formed draft, possibly the fixed insufficient-evidence one.
    /// Blocks on the external call when one is configured.
    pub fn run(&self, raw_transcript: &str, context: Option<&str>) -> DraftOutcome {
        let _span = tracing::info_span!("draft_session").entered();

        let deidentification = deidentify(raw_transcript);
        let text = deidentification.deidentified.as_str();

        let adequacy = assess_adequacy(text);
        tracing::debug!(
            redactions = deidentification.redactions.len(),
            words = adequacy.total_word_count,
            terms = adequacy.distinct_signal_term_count,
            repetition = adequacy.repetition_ratio,
            sufficient = adequacy.sufficient,
            "Adequacy assessed"
        );

        let mut external_error = None;
        let draft = if !adequacy.sufficient {
            insufficient_draft(DraftMethod::RuleBased)
        } else {
            let external = self.external.as_ref().and_then(|analyzer| {
                match analyzer.analyze(text, context, &self.catalog) {
                    Ok(verified) => Some(verified.into_draft()),
                    Err(e) => {
                        tracing::warn!(
                            error_kind = e.kind(),
                            "External analysis unavailable, falling back to rule-based"
                        );
                        external_error = Some(e.to_string());
                        None
                    }
                }
            });
            external.unwrap_or_else(|| self.rule_based_draft(text))
        };

        let draft = enforce_evidence_invariant(draft);
        tracing::info!(
            method = %draft.meta.method,
            category = draft.category_id.as_deref().unwrap_or("none"),
            entrustment = %draft.entrustment,
            insufficient = draft.is_insufficient(),
            "Draft produced"
        );

        DraftOutcome {
            deidentification,
            adequacy,
            draft,
            external_error,
        }
    }

    fn rule_based_draft(&self, text: &str) -> FeedbackDraft {
        let category = match_category(text, &self.catalog);
        let entrustment = infer_entrustment(text);

        let mut draft = build_draft(
            text,
            category.category_id.as_deref(),
            entrustment.level,
            category.confidence,
            entrustment.confidence,
        );
        draft.meta.alternate_category_ids = Some(category.alternates());
        draft.meta.category_rationale = Some(format!(
            "Keyword overlap score {} (runner-up {})",
            category.best_score(),
            category.runner_up_score()
        ));
        draft
    }
}
