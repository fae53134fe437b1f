//! Adequacy gate and the fixed insufficient-evidence draft.
//!
//! The gate runs on the de-identified transcript before any scoring. Short or
//! generic transcripts otherwise yield confident-looking but meaningless
//! category matches, so a failing gate replaces every later stage with
//! [`insufficient_draft`].

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::matcher::NO_MATCH_CONFIDENCE;
use crate::models::draft::{DraftMeta, FeedbackDraft};
use crate::models::enums::{DraftMethod, EntrustmentLevel};

pub const MIN_WORD_COUNT: usize = 40;
pub const MIN_DISTINCT_TERMS: usize = 3;
pub const MAX_REPETITION_RATIO: f64 = 0.35;

/// Entrustment confidence carried by the insufficient-evidence draft.
pub const INSUFFICIENT_ENTRUSTMENT_CONFIDENCE: f64 = 0.35;

pub const INSUFFICIENT_IMPROVEMENT: &str = "Provide a longer, more specific transcript that \
describes what the resident actually did (assessment, plan, communication, escalation) \
and the feedback given.";

pub const INSUFFICIENT_NEXT_STEP: &str = "Re-submit the session once the conversation \
includes concrete observations of the resident's performance.";

pub const INSUFFICIENT_SUMMARY: &str = "Evidence in this transcript was insufficient to \
draft reliable EPA feedback. No EPA was mapped and no entrustment rating should be \
inferred from this draft; please add specific observations before sending.";

/// Clinical and feedback action stems. Each matches at a word start, so
/// "assess" also covers "assessment" and "escalat" covers "escalated".
const ACTION_TERMS: &[&str] = &[
    "assess",
    "reassess",
    "differential",
    "diagnos",
    "plan",
    "prioriti",
    "escalat",
    "consult",
    "handover",
    "monitor",
    "discharge",
    "investigat",
    "order",
    "treat",
    "manag",
    "communicat",
    "explain",
    "document",
    "follow-up",
    "safety",
    "vital",
    "exam",
    "histor",
    "medication",
    "review",
    "recommend",
    "counsel",
    "goals",
    "contingenc",
    "disclos",
    "understand",
    "question",
    "learn",
    "guideline",
    "workup",
    "consent",
    "procedur",
    "complication",
];

static WORD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+(?:['’-]\w+)*").expect("Invalid word token pattern"));

static ACTION_TERM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ACTION_TERMS
        .iter()
        .map(|t| {
            Regex::new(&format!(r"(?i)\b{}", regex::escape(t)))
                .expect("Invalid action term pattern")
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdequacyAssessment {
    pub sufficient: bool,
    pub total_word_count: usize,
    pub distinct_signal_term_count: usize,
    pub repetition_ratio: f64,
}

/// Decide whether `text` carries enough specific signal to draft from.
pub fn assess_adequacy(text: &str) -> AdequacyAssessment {
    let tokens: Vec<String> = WORD_TOKEN
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let total = tokens.len();
    let distinct = tokens
        .iter()
        .collect::<std::collections::HashSet<_>>()
        .len();
    let repetition_ratio = if total == 0 {
        1.0
    } else {
        1.0 - distinct as f64 / total as f64
    };

    let terms = ACTION_TERM_PATTERNS
        .iter()
        .filter(|p| p.is_match(text))
        .count();

    AdequacyAssessment {
        sufficient: total >= MIN_WORD_COUNT
            && terms >= MIN_DISTINCT_TERMS
            && repetition_ratio <= MAX_REPETITION_RATIO,
        total_word_count: total,
        distinct_signal_term_count: terms,
        repetition_ratio,
    }
}

/// The fixed draft substituted when evidence is insufficient.
pub fn insufficient_draft(method: DraftMethod) -> FeedbackDraft {
    let mut meta = DraftMeta::new(method);
    meta.insufficient_evidence = Some(true);
    meta.category_confidence = Some(NO_MATCH_CONFIDENCE);
    meta.entrustment_confidence = Some(INSUFFICIENT_ENTRUSTMENT_CONFIDENCE);

    FeedbackDraft {
        meta,
        category_id: None,
        entrustment: EntrustmentLevel::Support,
        strengths: vec![],
        improvements: vec![INSUFFICIENT_IMPROVEMENT.to_string()],
        next_steps: vec![INSUFFICIENT_NEXT_STEP.to_string()],
        evidence_quotes: vec![],
        summary_comment: INSUFFICIENT_SUMMARY.to_string(),
    }
}

/// Canonicalise any draft flagged insufficient into the fixed shape.
///
/// Only the meta flag decides. The gate sets it for rule-based drafts; the
/// collaborator's self-report or quote verification sets it for external
/// ones. A rule-based draft that passed the gate but found no evidence
/// sentence keeps its category and generic scaffolding. The producing
/// method, the stated reason and any validation warnings are kept;
/// everything else is replaced.
pub fn enforce_evidence_invariant(draft: FeedbackDraft) -> FeedbackDraft {
    if !draft.is_insufficient() {
        return draft;
    }
    let mut canonical = insufficient_draft(draft.meta.method);
    canonical.meta.insufficient_reason = draft.meta.insufficient_reason;
    canonical.meta.validation_warnings = draft.meta.validation_warnings;
    canonical
}
