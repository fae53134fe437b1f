//! Best-effort PHI redaction for free-text transcripts.
//!
//! Redaction is a fixed, ordered list of independent pattern passes. Each pass
//! is a pure `text -> (text, records)` transformation over the output of the
//! previous pass, so a later pass sees placeholders inserted by earlier ones.
//! Emails run before names so that an address' local part is never treated as
//! a name fragment.
//!
//! Matching is heuristic. Missed identifiers (false negatives) and non-PHI
//! spans swallowed by a placeholder (false positives, e.g. a two-word
//! capitalized medical term caught by the full-name pass) are accepted
//! behaviour of this module, not defects.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::enums::RedactionKind;

pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";
pub const PHONE_PLACEHOLDER: &str = "[PHONE]";
pub const ID_PLACEHOLDER: &str = "[ID]";
pub const DATE_PLACEHOLDER: &str = "[DATE]";
pub const NAME_PLACEHOLDER: &str = "[NAME]";
pub const LOCATION_PLACEHOLDER: &str = "[LOCATION]";

/// One redacted span. Produced in match order; repeated literals yield one
/// record per occurrence.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionRecord {
    pub original: String,
    pub replacement: String,
    #[serde(rename = "type")]
    pub kind: RedactionKind,
}

// Debug output must never carry the redacted text.
impl std::fmt::Debug for RedactionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactionRecord")
            .field("original", &format_args!("<{} chars>", self.original.chars().count()))
            .field("replacement", &self.replacement)
            .field("kind", &self.kind)
            .finish()
    }
}

/// De-identified text plus the ordered redaction report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeidentificationResult {
    pub deidentified: String,
    pub redactions: Vec<RedactionRecord>,
}

impl DeidentificationResult {
    pub fn count_of(&self, kind: RedactionKind) -> usize {
        self.redactions.iter().filter(|r| r.kind == kind).count()
    }
}

/// A single redaction pass: one pattern, one placeholder, one kind.
pub struct RedactionPass {
    pub name: &'static str,
    regex: Regex,
    pub replacement: &'static str,
    pub kind: RedactionKind,
}

impl RedactionPass {
    /// Find all non-overlapping matches in `text`, record each, then replace
    /// every literal occurrence of each matched string across the text.
    pub fn apply(&self, text: &str) -> (String, Vec<RedactionRecord>) {
        let mut out = text.to_string();
        let mut records = Vec::new();

        for mat in self.regex.find_iter(text) {
            let original = mat.as_str();
            if original.is_empty() {
                continue;
            }
            records.push(RedactionRecord {
                original: original.to_string(),
                replacement: self.replacement.to_string(),
                kind: self.kind,
            });
            out = out.replace(original, self.replacement);
        }

        (out, records)
    }
}

fn pass(
    name: &'static str,
    regex_str: &str,
    replacement: &'static str,
    kind: RedactionKind,
) -> RedactionPass {
    RedactionPass {
        name,
        regex: Regex::new(regex_str).expect("Invalid redaction regex pattern"),
        replacement,
        kind,
    }
}

/// The redaction pipeline, in application order.
static PASSES: LazyLock<Vec<RedactionPass>> = LazyLock::new(|| {
    vec![
        pass(
            "email",
            r"(?i)[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}",
            EMAIL_PLACEHOLDER,
            RedactionKind::Contact,
        ),
        pass(
            "phone",
            r"\b(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
            PHONE_PLACEHOLDER,
            RedactionKind::Contact,
        ),
        // MRN-like bare numbers
        pass("identifier", r"\b\d{7,10}\b", ID_PLACEHOLDER, RedactionKind::Id),
        pass(
            "date",
            r"(?i)\b(?:\d{1,2}[/\-]\d{1,2}[/\-]\d{2,4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\s+\d{1,2}(?:,\s*\d{4})?)\b",
            DATE_PLACEHOLDER,
            RedactionKind::Date,
        ),
        pass(
            "honorific_name",
            r"\b(?:Mr\.?|Ms\.?|Mrs\.?|Mx\.?|Dr\.?)\s+[A-Z][a-z]+\b",
            NAME_PLACEHOLDER,
            RedactionKind::Name,
        ),
        pass(
            "full_name",
            r"\b[A-Z][a-z]{2,}\s+[A-Z][a-z]{2,}\b",
            NAME_PLACEHOLDER,
            RedactionKind::Name,
        ),
        pass(
            "location",
            r"(?i)\b(?:Toronto|Ontario|Mississauga|Brampton|Scarborough|Etobicoke|Hamilton|Ottawa|ICU|ED|Emergency|Ward\s+\d+|Room\s+\d+)\b",
            LOCATION_PLACEHOLDER,
            RedactionKind::Location,
        ),
    ]
});

/// All redaction passes in the order `deidentify` applies them.
pub fn redaction_passes() -> &'static [RedactionPass] {
    &PASSES
}

/// De-identify raw text. Pure and deterministic; total over any input.
pub fn deidentify(raw: &str) -> DeidentificationResult {
    let mut text = raw.to_string();
    let mut redactions = Vec::new();

    for pass in redaction_passes() {
        let (out, found) = pass.apply(&text);
        if !found.is_empty() {
            tracing::debug!(pass = pass.name, matches = found.len(), "redaction pass applied");
        }
        text = out;
        redactions.extend(found);
    }

    DeidentificationResult {
        deidentified: text,
        redactions,
    }
}
