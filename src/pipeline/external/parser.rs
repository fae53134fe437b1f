use std::str::FromStr;

use serde::Deserialize;

use super::types::AnalysisResponse;
use super::ExternalError;
use crate::models::enums::EntrustmentLevel;

pub const MAX_SECONDARY_IDS: usize = 2;
pub const MAX_RATIONALE_CHARS: usize = 400;
pub const MAX_LIST_ITEMS: usize = 6;
pub const MIN_LIST_ITEMS: usize = 2;
pub const MIN_SUMMARY_CHARS: usize = 20;
pub const MAX_SUMMARY_CHARS: usize = 1200;

/// Parse a model reply into a schema-checked [`AnalysisResponse`].
pub fn parse_analysis_response(reply: &str) -> Result<AnalysisResponse, ExternalError> {
    let json = extract_json_object(reply)?;
    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| ExternalError::JsonParsing(e.to_string()))?;
    validate_schema(raw)
}

/// Slice from the first `{` to the last `}`; models often wrap JSON in prose
/// or code fences.
fn extract_json_object(reply: &str) -> Result<&str, ExternalError> {
    match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&reply[start..=end]),
        _ => Err(ExternalError::MalformedResponse(
            "No JSON object found in reply".into(),
        )),
    }
}

/// Loosely typed reply. Enumerations and bounds are checked in
/// [`validate_schema`] so that every violation is reported at once.
#[derive(Deserialize)]
struct RawAnalysis {
    #[serde(default)]
    insufficient_evidence: bool,
    #[serde(default)]
    insufficient_reason: Option<String>,
    primary_epa_id: Option<String>,
    #[serde(default)]
    secondary_epa_ids: Option<Vec<String>>,
    epa_confidence: f64,
    epa_rationale: String,
    entrustment_level: String,
    entrustment_confidence: f64,
    strengths: Vec<String>,
    improvements: Vec<String>,
    next_steps: Vec<String>,
    evidence_quotes: Vec<String>,
    summary_comment: String,
}

fn validate_schema(raw: RawAnalysis) -> Result<AnalysisResponse, ExternalError> {
    let mut issues: Vec<String> = Vec::new();

    let secondary = raw.secondary_epa_ids.unwrap_or_default();
    if secondary.len() > MAX_SECONDARY_IDS {
        issues.push(format!("secondary_epa_ids has more than {MAX_SECONDARY_IDS} items"));
    }

    for (field, value) in [
        ("epa_confidence", raw.epa_confidence),
        ("entrustment_confidence", raw.entrustment_confidence),
    ] {
        if !(0.0..=1.0).contains(&value) {
            issues.push(format!("{field} must be within [0, 1]"));
        }
    }

    if raw.epa_rationale.chars().count() > MAX_RATIONALE_CHARS {
        issues.push(format!("epa_rationale exceeds {MAX_RATIONALE_CHARS} characters"));
    }
    if let Some(reason) = &raw.insufficient_reason {
        if reason.chars().count() > MAX_RATIONALE_CHARS {
            issues.push(format!("insufficient_reason exceeds {MAX_RATIONALE_CHARS} characters"));
        }
    }

    let entrustment = EntrustmentLevel::from_str(&raw.entrustment_level);
    if entrustment.is_err() {
        issues.push("entrustment_level is not a recognised level".into());
    }

    for (field, items) in [
        ("strengths", &raw.strengths),
        ("improvements", &raw.improvements),
        ("next_steps", &raw.next_steps),
        ("evidence_quotes", &raw.evidence_quotes),
    ] {
        if items.len() > MAX_LIST_ITEMS {
            issues.push(format!("{field} has more than {MAX_LIST_ITEMS} items"));
        }
        if !raw.insufficient_evidence && items.len() < MIN_LIST_ITEMS {
            issues.push(format!(
                "{field} needs at least {MIN_LIST_ITEMS} items unless insufficient_evidence is true"
            ));
        }
    }

    let summary_len = raw.summary_comment.chars().count();
    if !(MIN_SUMMARY_CHARS..=MAX_SUMMARY_CHARS).contains(&summary_len) {
        issues.push(format!(
            "summary_comment must be {MIN_SUMMARY_CHARS}-{MAX_SUMMARY_CHARS} characters"
        ));
    }

    match entrustment {
        Ok(entrustment_level) if issues.is_empty() => Ok(AnalysisResponse {
            insufficient_evidence: raw.insufficient_evidence,
            insufficient_reason: raw.insufficient_reason,
            primary_epa_id: raw.primary_epa_id,
            secondary_epa_ids: secondary,
            epa_confidence: raw.epa_confidence,
            epa_rationale: raw.epa_rationale,
            entrustment_level,
            entrustment_confidence: raw.entrustment_confidence,
            strengths: raw.strengths,
            improvements: raw.improvements,
            next_steps: raw.next_steps,
            evidence_quotes: raw.evidence_quotes,
            summary_comment: raw.summary_comment,
        }),
        _ => Err(ExternalError::SchemaViolation(issues.join("; "))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn valid_reply() -> serde_json::Value {
        serde_json::json!({
            "insufficient_evidence": false,
            "primary_epa_id": "FOD-1",
            "secondary_epa_ids": ["FOD-5"],
            "epa_confidence": 0.8,
            "epa_rationale": "Acute chest pain assessment with differential and initial tests.",
            "entrustment_level": "Autonomy",
            "entrustment_confidence": 0.7,
            "strengths": ["Prioritized ABCs", "Ordered troponins and CXR promptly"],
            "improvements": [
                "State the management plan \"earlier while waiting for confirmatory tests\"",
                "Verbalize the leading diagnosis"
            ],
            "next_steps": ["Practice a one-line plan", "Summarize the differential aloud"],
            "evidence_quotes": ["ordered troponins and CXR quickly", "started a focused differential"],
            "summary_comment": "Solid acute assessment; state the plan earlier next time."
        })
    }

    fn parse_value(value: &serde_json::Value) -> Result<AnalysisResponse, ExternalError> {
        parse_analysis_response(&value.to_string())
    }

    #[test]
    fn valid_reply_parses() {
        let a = parse_value(&valid_reply()).unwrap();
        assert_eq!(a.primary_epa_id.as_deref(), Some("FOD-1"));
        assert_eq!(a.entrustment_level, EntrustmentLevel::Autonomy);
        assert_eq!(a.secondary_epa_ids, vec!["FOD-5".to_string()]);
        assert!(!a.insufficient_evidence);
    }

    #[test]
    fn json_wrapped_in_prose_and_fences() {
        let reply = format!("Here you go:\n```json\n{}\n```\nThanks!", valid_reply());
        assert!(parse_analysis_response(&reply).is_ok());
    }

    #[test]
    fn no_json_object_is_malformed() {
        assert!(matches!(
            parse_analysis_response("I cannot help with that."),
            Err(ExternalError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_analysis_response("} backwards {"),
            Err(ExternalError::MalformedResponse(_))
        ));
    }

    #[test]
    fn missing_required_field_is_json_error() {
        let mut v = valid_reply();
        v.as_object_mut().unwrap().remove("summary_comment");
        assert!(matches!(parse_value(&v), Err(ExternalError::JsonParsing(_))));
    }

    #[test]
    fn null_secondary_ids_become_empty() {
        let mut v = valid_reply();
        v["secondary_epa_ids"] = serde_json::Value::Null;
        assert!(parse_value(&v).unwrap().secondary_epa_ids.is_empty());
        v.as_object_mut().unwrap().remove("secondary_epa_ids");
        assert!(parse_value(&v).unwrap().secondary_epa_ids.is_empty());
    }

    #[test]
    fn insufficient_evidence_defaults_false() {
        let mut v = valid_reply();
        v.as_object_mut().unwrap().remove("insufficient_evidence");
        assert!(!parse_value(&v).unwrap().insufficient_evidence);
    }

    #[test]
    fn null_primary_id_allowed() {
        let mut v = valid_reply();
        v["primary_epa_id"] = serde_json::Value::Null;
        assert_eq!(parse_value(&v).unwrap().primary_epa_id, None);
    }

    #[test]
    fn too_many_secondary_ids_rejected() {
        let mut v = valid_reply();
        v["secondary_epa_ids"] = serde_json::json!(["A", "B", "C"]);
        let err = parse_value(&v).unwrap_err();
        assert!(err.to_string().contains("secondary_epa_ids"));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let mut v = valid_reply();
        v["epa_confidence"] = serde_json::json!(1.5);
        v["entrustment_confidence"] = serde_json::json!(-0.1);
        let err = parse_value(&v).unwrap_err().to_string();
        assert!(err.contains("epa_confidence"));
        assert!(err.contains("entrustment_confidence"));
    }

    #[test]
    fn unknown_entrustment_level_rejected() {
        let mut v = valid_reply();
        v["entrustment_level"] = serde_json::json!("Competent");
        assert!(matches!(parse_value(&v), Err(ExternalError::SchemaViolation(_))));
    }

    #[test]
    fn list_bounds_enforced() {
        let mut v = valid_reply();
        v["strengths"] = serde_json::json!(["only one"]);
        v["next_steps"] = serde_json::json!(["1", "2", "3", "4", "5", "6", "7"]);
        let err = parse_value(&v).unwrap_err().to_string();
        assert!(err.contains("strengths needs at least 2"));
        assert!(err.contains("next_steps has more than 6"));
    }

    #[test]
    fn sparse_lists_allowed_when_insufficient() {
        let mut v = valid_reply();
        v["insufficient_evidence"] = serde_json::json!(true);
        v["insufficient_reason"] = serde_json::json!("Transcript is a greeting only.");
        for field in ["strengths", "improvements", "next_steps", "evidence_quotes"] {
            v[field] = serde_json::json!([]);
        }
        let a = parse_value(&v).unwrap();
        assert!(a.insufficient_evidence);
        assert_eq!(a.insufficient_reason.as_deref(), Some("Transcript is a greeting only."));
    }

    #[test]
    fn summary_length_bounds() {
        let mut v = valid_reply();
        v["summary_comment"] = serde_json::json!("too short");
        assert!(parse_value(&v).is_err());
        v["summary_comment"] = serde_json::json!("x".repeat(1201));
        assert!(parse_value(&v).is_err());
    }

    #[test]
    fn long_rationale_rejected() {
        let mut v = valid_reply();
        v["epa_rationale"] = serde_json::json!("r".repeat(401));
        assert!(parse_value(&v).is_err());
    }
}
