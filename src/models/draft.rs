use serde::{Deserialize, Serialize};

use super::enums::{DraftMethod, EntrustmentLevel};

/// Provenance and confidence data attached to a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMeta {
    pub method: DraftMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insufficient_evidence: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insufficient_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_category_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrustment_confidence: Option<f64>,
    /// Items discarded or adjusted while validating collaborator output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warnings: Option<Vec<String>>,
}

impl DraftMeta {
    pub fn new(method: DraftMethod) -> Self {
        Self {
            method,
            insufficient_evidence: None,
            insufficient_reason: None,
            category_rationale: None,
            alternate_category_ids: None,
            category_confidence: None,
            entrustment_confidence: None,
            validation_warnings: None,
        }
    }
}

/// Reviewer-editable feedback draft. Terminal artifact of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDraft {
    pub meta: DraftMeta,
    pub category_id: Option<String>,
    pub entrustment: EntrustmentLevel,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub next_steps: Vec<String>,
    pub evidence_quotes: Vec<String>,
    pub summary_comment: String,
}

impl FeedbackDraft {
    pub fn is_insufficient(&self) -> bool {
        self.meta.insufficient_evidence.unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_draft() -> FeedbackDraft {
        FeedbackDraft {
            meta: DraftMeta {
                method: DraftMethod::RuleBased,
                insufficient_evidence: None,
                insufficient_reason: None,
                category_rationale: Some("Keyword overlap 7 (runner-up 2)".into()),
                alternate_category_ids: Some(vec!["FOD-5".into(), "FOD-2C".into()]),
                category_confidence: Some(0.6666666666666666),
                entrustment_confidence: Some(0.7000000000000001),
                validation_warnings: Some(vec![]),
            },
            category_id: Some("FOD-1".into()),
            entrustment: EntrustmentLevel::Autonomy,
            strengths: vec!["You ordered troponins and CXR quickly.".into()],
            improvements: vec!["You noted \"state your plan earlier\"; make this explicit.".into()],
            next_steps: vec!["Practice a structured plan.".into()],
            evidence_quotes: vec!["Next time, state your plan — earlier.".into()],
            summary_comment: "Draft mapped to FOD-1 with an entrustment rating of Autonomy.".into(),
        }
    }

    #[test]
    fn draft_serializes_camel_case() {
        let json = sample_draft().to_json().unwrap();
        assert!(json.contains("\"categoryId\":\"FOD-1\""));
        assert!(json.contains("\"evidenceQuotes\""));
        assert!(json.contains("\"summaryComment\""));
        assert!(json.contains("\"alternateCategoryIds\""));
        assert!(json.contains("\"method\":\"ruleBased\""));
    }

    #[test]
    fn null_category_serialized_explicitly() {
        let mut draft = sample_draft();
        draft.category_id = None;
        let json = draft.to_json().unwrap();
        assert!(json.contains("\"categoryId\":null"));
    }

    #[test]
    fn persistence_round_trip_is_lossless() {
        let draft = sample_draft();
        let json = draft.to_json().unwrap();
        let restored = FeedbackDraft::from_json(&json).unwrap();
        assert_eq!(restored, draft);
        assert_eq!(restored.to_json().unwrap(), json);
    }

    #[test]
    fn absent_optional_meta_stays_absent() {
        let mut draft = sample_draft();
        draft.meta = DraftMeta::new(DraftMethod::External);
        let json = draft.to_json().unwrap();
        assert!(!json.contains("insufficientEvidence"));
        assert!(!json.contains("validationWarnings"));
        let restored = FeedbackDraft::from_json(&json).unwrap();
        assert_eq!(restored.meta, DraftMeta::new(DraftMethod::External));
    }

    #[test]
    fn insufficient_flag_accessor() {
        let mut draft = sample_draft();
        assert!(!draft.is_insufficient());
        draft.meta.insufficient_evidence = Some(true);
        assert!(draft.is_insufficient());
    }
}
