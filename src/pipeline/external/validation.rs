// Post-parse verification of collaborator output against the catalog and the
// transcript. Applied between parse_analysis_response() and draft construction.
// Unknown ids and unverifiable quotes are treated as hallucinations: removed,
// recorded as warnings, and paid for in confidence.

use std::sync::LazyLock;

use regex::Regex;

use super::types::AnalysisResponse;
use crate::catalog::CategoryCatalog;
use crate::models::draft::{DraftMeta, FeedbackDraft};
use crate::models::enums::DraftMethod;

/// Confidence ceiling once an unknown primary id has been discarded.
pub const UNKNOWN_CATEGORY_CONFIDENCE_CAP: f64 = 0.4;

/// Confidence lost per discarded quote or bullet.
pub const DISCARD_PENALTY: f64 = 0.1;

/// Recorded when no evidence quote survives verification.
pub const NO_VERIFIED_QUOTES_REASON: &str =
    "None of the returned evidence quotes could be found in the transcript.";

static QUOTED_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"“”]+)["”]"#).expect("Invalid quoted fragment pattern"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

/// Verified analysis (possibly filtered) + warnings.
#[derive(Debug, Clone)]
pub struct VerifiedAnalysis {
    pub analysis: AnalysisResponse,
    pub warnings: Vec<String>,
}

/// Lowercase, drop double quote marks, trim surrounding single quotes and
/// collapse whitespace runs to one space.
fn normalize_for_match(text: &str) -> String {
    let lowered = text.to_lowercase();
    let unquoted: String = lowered
        .chars()
        .filter(|c| !matches!(c, '"' | '“' | '”'))
        .collect();
    let collapsed = WHITESPACE_RUN.replace_all(&unquoted, " ");
    collapsed
        .trim()
        .trim_matches(|c| matches!(c, '\'' | '‘' | '’'))
        .trim()
        .to_string()
}

fn occurs_in(normalized_transcript: &str, fragment: &str) -> bool {
    let needle = normalize_for_match(fragment);
    !needle.is_empty() && normalized_transcript.contains(&needle)
}

/// Check ids against the catalog and quotes against the transcript.
pub fn verify_analysis(
    mut analysis: AnalysisResponse,
    catalog: &CategoryCatalog,
    transcript: &str,
) -> VerifiedAnalysis {
    let mut warnings = Vec::new();

    check_category_ids(&mut analysis, catalog, &mut warnings);

    let normalized = normalize_for_match(transcript);
    let discarded = verify_evidence_quotes(&mut analysis, &normalized, &mut warnings)
        + verify_improvement_quotes(&mut analysis, &normalized, &mut warnings);

    if discarded > 0 {
        let penalty = DISCARD_PENALTY * discarded as f64;
        analysis.epa_confidence = (analysis.epa_confidence - penalty).max(0.0);
        analysis.entrustment_confidence = (analysis.entrustment_confidence - penalty).max(0.0);
    }

    if analysis.evidence_quotes.is_empty() && !analysis.insufficient_evidence {
        analysis.insufficient_evidence = true;
        if analysis.insufficient_reason.is_none() {
            analysis.insufficient_reason = Some(NO_VERIFIED_QUOTES_REASON.to_string());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            warning_count = warnings.len(),
            discarded,
            "External analysis verification warnings"
        );
    }

    VerifiedAnalysis { analysis, warnings }
}

fn check_category_ids(
    analysis: &mut AnalysisResponse,
    catalog: &CategoryCatalog,
    warnings: &mut Vec<String>,
) {
    if let Some(id) = &analysis.primary_epa_id {
        if !catalog.contains(id) {
            warnings.push(format!("Unknown primary category id '{id}' discarded"));
            analysis.primary_epa_id = None;
            analysis.epa_confidence = analysis.epa_confidence.min(UNKNOWN_CATEGORY_CONFIDENCE_CAP);
        }
    }

    let before = analysis.secondary_epa_ids.len();
    analysis.secondary_epa_ids.retain(|id| catalog.contains(id));
    let dropped = before - analysis.secondary_epa_ids.len();
    if dropped > 0 {
        warnings.push(format!("{dropped} unknown secondary category id(s) discarded"));
    }
}

/// Evidence quotes must occur verbatim (modulo case, whitespace and quote
/// marks) in the transcript. Returns the number discarded.
fn verify_evidence_quotes(
    analysis: &mut AnalysisResponse,
    normalized_transcript: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let mut kept = Vec::with_capacity(analysis.evidence_quotes.len());
    let mut discarded = 0;
    for (i, quote) in analysis.evidence_quotes.drain(..).enumerate() {
        if occurs_in(normalized_transcript, &quote) {
            kept.push(quote);
        } else {
            warnings.push(format!("Evidence quote #{} not found in transcript; discarded", i + 1));
            discarded += 1;
        }
    }
    analysis.evidence_quotes = kept;
    discarded
}

/// Improvement bullets that quote the transcript must quote it accurately.
/// Bullets without quoted fragments are kept as-is.
fn verify_improvement_quotes(
    analysis: &mut AnalysisResponse,
    normalized_transcript: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let mut kept = Vec::with_capacity(analysis.improvements.len());
    let mut discarded = 0;
    for (i, bullet) in analysis.improvements.drain(..).enumerate() {
        let all_found = QUOTED_FRAGMENT
            .captures_iter(&bullet)
            .filter_map(|c| c.get(1))
            .all(|m| occurs_in(normalized_transcript, m.as_str()));
        if all_found {
            kept.push(bullet);
        } else {
            warnings.push(format!(
                "Improvement #{} quotes text not found in transcript; discarded",
                i + 1
            ));
            discarded += 1;
        }
    }
    analysis.improvements = kept;
    discarded
}

impl VerifiedAnalysis {
    /// Build the external-method draft. Insufficiency is canonicalised later
    /// by the orchestrator.
    pub fn into_draft(self) -> FeedbackDraft {
        let a = self.analysis;
        let mut meta = DraftMeta::new(DraftMethod::External);
        meta.insufficient_evidence = Some(a.insufficient_evidence);
        meta.insufficient_reason = a.insufficient_reason;
        meta.category_rationale = Some(a.epa_rationale);
        meta.alternate_category_ids = Some(a.secondary_epa_ids);
        meta.category_confidence = Some(a.epa_confidence);
        meta.entrustment_confidence = Some(a.entrustment_confidence);
        if !self.warnings.is_empty() {
            meta.validation_warnings = Some(self.warnings);
        }

        FeedbackDraft {
            meta,
            category_id: a.primary_epa_id,
            entrustment: a.entrustment_level,
            strengths: a.strengths,
            improvements: a.improvements,
            next_steps: a.next_steps,
            evidence_quotes: a.evidence_quotes,
            summary_comment: a.summary_comment,
        }
    }
}
