use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::draft::FeedbackDraft;
use super::enums::{EmailStatus, EntrustmentLevel};
use crate::pipeline::redaction::RedactionRecord;

/// Input for creating a feedback session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    pub resident_name: String,
    pub resident_email: String,
    pub attending_name: String,
    pub attending_email: String,
    #[serde(default)]
    pub context: Option<String>,
    pub transcript: String,
}

/// A stored feedback session, as persisted by the session repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub resident_name: String,
    pub resident_email: String,
    pub attending_name: String,
    pub attending_email: String,
    pub context: Option<String>,
    pub transcript_raw: String,
    pub transcript_deidentified: String,
    pub redactions: Vec<RedactionRecord>,
    pub category_id: Option<String>,
    pub category_confidence: f64,
    pub entrustment: EntrustmentLevel,
    pub entrustment_confidence: f64,
    pub draft: FeedbackDraft,
    pub approved: bool,
    pub approved_at: Option<NaiveDateTime>,
    pub email_status: EmailStatus,
    pub email_error: Option<String>,
    pub email_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// List-view projection of a session (no transcript text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub resident_name: String,
    pub attending_name: String,
    pub category_id: Option<String>,
    pub entrustment: EntrustmentLevel,
    pub approved: bool,
    pub email_status: EmailStatus,
    pub created_at: NaiveDateTime,
}
