use serde::Serialize;

use crate::models::enums::EntrustmentLevel;

const MAX_SIGNALS: usize = 8;

/// Phrases suggesting the resident needed more supervision.
const DOWN_SIGNALS: &[(&str, i32)] = &[
    ("i had to step in", -3),
    ("i had to take over", -3),
    ("needs constant", -2),
    ("unsafe", -4),
    ("not ready", -3),
    ("required prompting", -2),
    ("missed", -1),
    ("didn't recognize", -2),
    ("needs direct supervision", -3),
    ("i corrected", -2),
];

/// Phrases suggesting the resident worked with less supervision.
/// Plain substring matching: "unsafe" also scores "safe".
const UP_SIGNALS: &[(&str, i32)] = &[
    ("independently", 3),
    ("excellent", 4),
    ("great job", 2),
    ("strong", 2),
    ("appropriate plan", 2),
    ("good judgement", 3),
    ("safe", 2),
    ("well done", 2),
    ("handled", 2),
    ("autonomous", 4),
    ("minimal prompting", 2),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrustmentInference {
    pub level: EntrustmentLevel,
    pub confidence: f64,
    /// Matched phrases prefixed with `-` or `+`, down signals first.
    pub signals: Vec<String>,
    pub score: i32,
}

pub fn level_for_score(score: i32) -> EntrustmentLevel {
    match score {
        s if s <= -4 => EntrustmentLevel::Intervention,
        s if s <= -1 => EntrustmentLevel::Direction,
        s if s <= 2 => EntrustmentLevel::Support,
        s if s <= 5 => EntrustmentLevel::Autonomy,
        _ => EntrustmentLevel::Excellence,
    }
}

pub fn confidence_for_score(score: i32) -> f64 {
    (0.55 + f64::from(score) * 0.05).clamp(0.35, 0.9)
}

/// Infer an entrustment level from lexical supervision signals.
pub fn infer_entrustment(text: &str) -> EntrustmentInference {
    let lowered = text.to_lowercase();
    let mut score = 0;
    let mut signals = Vec::new();

    for (phrase, delta) in DOWN_SIGNALS {
        if lowered.contains(phrase) {
            score += delta;
            signals.push(format!("- {phrase}"));
        }
    }
    for (phrase, delta) in UP_SIGNALS {
        if lowered.contains(phrase) {
            score += delta;
            signals.push(format!("+ {phrase}"));
        }
    }
    signals.truncate(MAX_SIGNALS);

    EntrustmentInference {
        level: level_for_score(score),
        confidence: confidence_for_score(score),
        signals,
        score,
    }
}
