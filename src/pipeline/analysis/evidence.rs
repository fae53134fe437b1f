//! Evidence extraction and rule-based draft assembly.
//!
//! The rule-based path never generates open-ended text. It lifts up to three
//! salient sentences out of the transcript as evidence, sorts them into
//! strength and improvement signals, and wraps short fragments of them in
//! fixed templates. Next steps are a fixed coaching checklist.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::draft::{DraftMeta, FeedbackDraft};
use crate::models::enums::{DraftMethod, EntrustmentLevel};

const MIN_SENTENCE_CHARS: usize = 30;
const MAX_SENTENCE_CHARS: usize = 180;
const MAX_EVIDENCE_QUOTES: usize = 3;
const MAX_FRAGMENT_CHARS: usize = 80;
const MAX_ITEMS_PER_LIST: usize = 3;

/// Closing quote marks that may follow a sentence terminator.
const SENTENCE_CLOSERS: &[char] = &['"', '\'', '”', '’', ')'];

const STRENGTH_WORDS: &[&str] = &[
    "good",
    "great",
    "strong",
    "clear",
    "excellent",
    "appropriate",
    "escalat",
    "organized",
    "thorough",
    "concise",
    "well done",
    "effective",
];

const IMPROVEMENT_WORDS: &[&str] = &[
    "need",
    "should",
    "consider",
    "next time",
    "improv",
    "missed",
    "earlier",
    "late",
    "unclear",
    "prompt",
    "step in",
    "instead",
    "work on",
    "tighten",
];

/// Used only when the transcript yields no evidence sentences at all.
const GENERIC_STRENGTHS: &[&str] = &[
    "Communicated a clear problem representation and differential.",
    "Prioritized patient safety and escalated appropriately when needed.",
];

const GENERIC_IMPROVEMENTS: &[&str] = &[
    "Tighten the assessment by explicitly stating the leading diagnosis and why.",
    "Be explicit about contingency planning and when to re-assess/escalate.",
];

pub const NEXT_STEPS: [&str; 3] = [
    "Before the next case, write a 1–2 sentence problem representation and top 3 differential, then compare to staff feedback.",
    "Practice a structured plan: immediate actions, investigations, treatments, and clear 'if/then' reassessment triggers.",
    "Ask for one targeted feedback point linked to this EPA at the end of the next shift/rounds.",
];

static SALIENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)good|great|strong|well|needs|next time|consider|should|improve|step in|prompt")
        .expect("Invalid salience pattern")
});

static SPEAKER_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[A-Za-z]{1,20}:\s*").expect("Invalid speaker label pattern"));

/// Split on `.`, `!` or `?` (plus any closing quote marks) followed by
/// whitespace. Sentences are trimmed; empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        while let Some(&(_, next)) = chars.peek() {
            if SENTENCE_CLOSERS.contains(&next) {
                chars.next();
            } else {
                break;
            }
        }
        match chars.peek() {
            Some(&(end, next)) if next.is_whitespace() => {
                sentences.push(&text[start..end]);
                while let Some(&(_, ws)) = chars.peek() {
                    if ws.is_whitespace() {
                        chars.next();
                    } else {
                        break;
                    }
                }
                start = chars.peek().map(|&(i, _)| i).unwrap_or(text.len());
            }
            _ => {}
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pick up to three evidence sentences, preferring feedback-indicative ones.
pub fn pick_evidence(text: &str) -> Vec<String> {
    let candidates: Vec<&str> = split_sentences(text)
        .into_iter()
        .filter(|s| (MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&s.chars().count()))
        .collect();

    let salient: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|s| SALIENCE.is_match(s))
        .collect();
    let source = if salient.is_empty() { candidates } else { salient };

    source
        .into_iter()
        .take(MAX_EVIDENCE_QUOTES)
        .map(str::to_string)
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max - 1).collect();
    format!("{}…", kept.trim_end())
}

/// Short fragment of a quote for templating: speaker label, quote marks and
/// a leading "you"/"I" removed, first letter lowercased, capped at 80 chars.
pub fn quote_fragment(quote: &str) -> String {
    fragment_parts(quote).0
}

/// Strip a leading "you " or "i " in any case. The flag reports whether one
/// was removed, so the rest reads as a verb phrase.
fn strip_subject(text: &str) -> (&str, bool) {
    for subject in ["you ", "i "] {
        let matched = text
            .get(..subject.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(subject));
        if matched {
            return (text[subject.len()..].trim_start(), true);
        }
    }
    (text, false)
}

fn fragment_parts(quote: &str) -> (String, bool) {
    let unlabelled = SPEAKER_LABEL.replace(quote, "");
    let unquoted: String = unlabelled
        .chars()
        .filter(|c| !matches!(c, '"' | '“' | '”'))
        .collect();
    let (fragment, addressed) = strip_subject(unquoted.trim());
    let fragment = fragment.trim_end_matches(['.', '!', '?', ',', ';', ':', ' ']);

    let mut chars = fragment.chars();
    let lowered = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    (truncate_chars(&lowered, MAX_FRAGMENT_CHARS), addressed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Strength,
    Improvement,
}

fn classify_quote(quote: &str) -> Option<Signal> {
    let lowered = quote.to_lowercase();
    if STRENGTH_WORDS.iter().any(|w| lowered.contains(w)) {
        Some(Signal::Strength)
    } else if IMPROVEMENT_WORDS.iter().any(|w| lowered.contains(w)) {
        Some(Signal::Improvement)
    } else {
        None
    }
}

/// Verb phrases take the resident as subject; anything else is quoted.
fn strength_sentence(fragment: &str, addressed: bool) -> String {
    if addressed {
        format!("You {fragment}, which showed effective clinical judgment in this encounter.")
    } else {
        format!("Strength observed in \"{fragment}\", which showed effective clinical judgment in this encounter.")
    }
}

fn improvement_sentence(fragment: &str) -> String {
    format!("You noted {fragment}; make this more explicit and state your reasoning out loud next time.")
}

/// Sort evidence into templated strength and improvement bullets.
/// Unclassified quotes go to whichever list is shorter.
pub fn categorize_evidence(evidence: &[String]) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    for quote in evidence {
        let (fragment, addressed) = fragment_parts(quote);
        let signal = classify_quote(quote).unwrap_or(if strengths.len() <= improvements.len() {
            Signal::Strength
        } else {
            Signal::Improvement
        });
        match signal {
            Signal::Strength if strengths.len() < MAX_ITEMS_PER_LIST => {
                strengths.push(strength_sentence(&fragment, addressed))
            }
            Signal::Improvement if improvements.len() < MAX_ITEMS_PER_LIST => {
                improvements.push(improvement_sentence(&fragment))
            }
            _ => {}
        }
    }

    if strengths.is_empty() {
        strengths = fallback_items(evidence, GENERIC_STRENGTHS, |f| {
            format!("Reviewer to confirm the strength shown here: \"{f}\".")
        });
    }
    if improvements.is_empty() {
        improvements = fallback_items(evidence, GENERIC_IMPROVEMENTS, |f| {
            format!("Consider what could be sharpened in this moment: \"{f}\".")
        });
    }

    (strengths, improvements)
}

fn fallback_items(
    evidence: &[String],
    generic: &[&str],
    template: impl Fn(&str) -> String,
) -> Vec<String> {
    if evidence.is_empty() {
        return generic.iter().map(|s| s.to_string()).collect();
    }
    evidence
        .iter()
        .take(2)
        .map(|q| template(&quote_fragment(q)))
        .collect()
}

pub fn summary_comment(category_id: Option<&str>, level: EntrustmentLevel) -> String {
    format!(
        "Draft mapped to {} with an entrustment rating of {}. This is a draft for attending \
         review; please edit for accuracy, context, and fairness before sending.",
        category_id.unwrap_or("an EPA (not confidently matched)"),
        level
    )
}

/// Assemble a rule-based draft from de-identified text and the scoring results.
pub fn build_draft(
    text: &str,
    category_id: Option<&str>,
    level: EntrustmentLevel,
    category_confidence: f64,
    entrustment_confidence: f64,
) -> FeedbackDraft {
    let evidence_quotes = pick_evidence(text);
    let (strengths, improvements) = categorize_evidence(&evidence_quotes);

    let mut meta = DraftMeta::new(DraftMethod::RuleBased);
    meta.category_confidence = Some(category_confidence);
    meta.entrustment_confidence = Some(entrustment_confidence);

    FeedbackDraft {
        meta,
        category_id: category_id.map(str::to_string),
        entrustment: level,
        strengths,
        improvements,
        next_steps: NEXT_STEPS.iter().map(|s| s.to_string()).collect(),
        evidence_quotes,
        summary_comment: summary_comment(category_id, level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::example_transcripts;
    use crate::pipeline::redaction::deidentify;

    fn example(id: &str) -> String {
        let raw = example_transcripts()
            .unwrap()
            .into_iter()
            .find(|e| e.id == id)
            .unwrap()
            .transcript;
        deidentify(&raw).deidentified
    }

    #[test]
    fn splits_on_terminal_punctuation_followed_by_space() {
        let s = split_sentences("First one. Second one! Third? Last");
        assert_eq!(s, vec!["First one.", "Second one!", "Third?", "Last"]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let s = split_sentences("Lactate was 2.4 today. Repeat it.");
        assert_eq!(s, vec!["Lactate was 2.4 today.", "Repeat it."]);
    }

    #[test]
    fn closing_quotes_stay_with_sentence() {
        let s = split_sentences("A: \"Good start.\"\nB: \"Thanks.\"");
        assert_eq!(s, vec!["A: \"Good start.\"", "B: \"Thanks.\""]);
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn evidence_prefers_salient_sentences() {
        let text = "We talked through the overnight admission in detail. \
                    You should state the leading diagnosis earlier in the plan. \
                    The patient was moved upstairs after midnight.";
        let ev = pick_evidence(text);
        assert_eq!(ev, vec!["You should state the leading diagnosis earlier in the plan."]);
    }

    #[test]
    fn evidence_falls_back_to_all_sentences() {
        let text = "We talked through the overnight admission in detail. \
                    The patient was moved upstairs after midnight.";
        let ev = pick_evidence(text);
        assert_eq!(ev.len(), 2);
    }

    #[test]
    fn evidence_length_window() {
        let long = format!("{} good.", "word ".repeat(40));
        let text = format!("Too short, good. {long} This one is good and within the window.");
        let ev = pick_evidence(&text);
        assert_eq!(ev, vec!["This one is good and within the window."]);
    }

    #[test]
    fn evidence_capped_at_three() {
        let text = "Good history taking today overall. Good exam technique on the ward. \
                    Good plan for the morning team. Good handover to nights as well.";
        assert_eq!(pick_evidence(text).len(), 3);
    }

    #[test]
    fn fragment_strips_label_quotes_and_subject() {
        assert_eq!(
            quote_fragment("Attending: \"You used plain language well.\""),
            "used plain language well"
        );
        assert_eq!(
            quote_fragment("Resident: \"I called for help.\""),
            "called for help"
        );
        assert_eq!(quote_fragment("Strong discharge communication."), "strong discharge communication");
    }

    #[test]
    fn fragment_strips_lowercase_subject() {
        assert_eq!(
            quote_fragment("Attending: you ordered troponins and a CXR early."),
            "ordered troponins and a CXR early"
        );
        assert_eq!(quote_fragment("i reviewed the ECG with you."), "reviewed the ECG with you");
        assert_eq!(quote_fragment("Youth clinic follow-up was arranged."), "youth clinic follow-up was arranged");
    }

    #[test]
    fn fragment_truncated_with_ellipsis() {
        let quote = "a".repeat(120);
        let f = quote_fragment(&quote);
        assert_eq!(f.chars().count(), 80);
        assert!(f.ends_with('…'));
    }

    #[test]
    fn quotes_classified_by_word_sets() {
        let evidence = vec![
            "Attending: \"Strong discharge communication.\"".to_string(),
            "Next time involve pharmacy earlier with medication changes.".to_string(),
        ];
        let (strengths, improvements) = categorize_evidence(&evidence);
        assert_eq!(
            strengths,
            vec!["Strength observed in \"strong discharge communication\", which showed effective clinical judgment in this encounter."]
        );
        assert_eq!(improvements.len(), 1);
        assert!(improvements[0].starts_with("You noted next time involve pharmacy earlier"));
    }

    #[test]
    fn addressed_strength_reads_as_sentence() {
        let evidence = vec!["Attending: you gave a clear and organized handover tonight.".to_string()];
        let (strengths, _) = categorize_evidence(&evidence);
        assert_eq!(
            strengths[0],
            "You gave a clear and organized handover tonight, which showed effective clinical judgment in this encounter."
        );
        assert!(!strengths[0].contains("You you"));
    }

    #[test]
    fn unclassified_quotes_balance_lists() {
        let evidence = vec![
            "The patient arrived from the clinic this morning.".to_string(),
            "The family asked about the visiting hours today.".to_string(),
        ];
        let (strengths, improvements) = categorize_evidence(&evidence);
        assert_eq!(strengths.len(), 1);
        assert_eq!(improvements.len(), 1);
        assert!(strengths[0].contains("the patient arrived"));
        assert!(improvements[0].contains("the family asked"));
    }

    #[test]
    fn empty_list_falls_back_to_raw_evidence() {
        let evidence = vec!["Great anticipation of the overnight contingencies.".to_string()];
        let (strengths, improvements) = categorize_evidence(&evidence);
        assert_eq!(strengths.len(), 1);
        assert_eq!(
            improvements,
            vec!["Consider what could be sharpened in this moment: \"great anticipation of the overnight contingencies\"."]
        );
    }

    #[test]
    fn no_evidence_uses_generic_lists() {
        let (strengths, improvements) = categorize_evidence(&[]);
        assert_eq!(strengths.len(), 2);
        assert_eq!(improvements.len(), 2);
        assert_eq!(strengths[0], GENERIC_STRENGTHS[0]);
    }

    #[test]
    fn summary_names_category_or_unmatched() {
        let s = summary_comment(Some("FOD-1"), EntrustmentLevel::Autonomy);
        assert!(s.starts_with("Draft mapped to FOD-1 with an entrustment rating of Autonomy."));
        assert!(s.contains("attending review"));
        let s = summary_comment(None, EntrustmentLevel::Support);
        assert!(s.contains("an EPA (not confidently matched)"));
    }

    #[test]
    fn build_draft_for_acute_example() {
        let text = example("fod-1-acute");
        let draft = build_draft(&text, Some("FOD-1"), EntrustmentLevel::Support, 0.94, 0.55);
        assert_eq!(draft.meta.method, DraftMethod::RuleBased);
        assert_eq!(draft.meta.category_confidence, Some(0.94));
        assert_eq!(draft.category_id.as_deref(), Some("FOD-1"));
        assert_eq!(draft.evidence_quotes.len(), 1);
        assert!(draft.evidence_quotes[0].starts_with("Next time, state your immediate management plan"));
        assert!(!draft.strengths.is_empty());
        assert!(!draft.improvements.is_empty());
        assert_eq!(draft.next_steps.len(), 3);
        assert!(!draft.is_insufficient());
    }

    #[test]
    fn every_example_yields_evidence() {
        for e in example_transcripts().unwrap() {
            let text = deidentify(&e.transcript).deidentified;
            let ev = pick_evidence(&text);
            assert!(!ev.is_empty(), "example {}", e.id);
            assert!(ev.iter().all(|q| text.contains(q.as_str())));
        }
    }

    #[test]
    fn evidence_quotes_are_verbatim_from_text() {
        let text = example("fod-2a-rounds");
        for quote in pick_evidence(&text) {
            assert!(text.contains(&quote));
        }
    }
}
