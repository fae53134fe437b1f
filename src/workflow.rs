//! Session workflow: create a session with its draft, let the attending edit
//! and approve it, and send it by email.
//!
//! Email state moves `created` → `email_pending` → `email_sent` | `email_failed`.
//! A failed send never loses the created session.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CategoryCatalog;
use crate::db::{self, DatabaseError};
use crate::models::draft::FeedbackDraft;
use crate::models::enums::{DraftMethod, EmailStatus};
use crate::models::session::{NewSession, SessionRecord};
use crate::notify::{is_valid_email, render_draft_email, DraftEmail, Notifier, NotifyError};
use crate::pipeline::DraftPipeline;

pub const MIN_TRANSCRIPT_CHARS: usize = 20;
pub const MIN_SUMMARY_CHARS: usize = 5;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(String),

    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Cannot edit after approval")]
    AlreadyApproved,

    #[error("Unknown EPA category: {0}")]
    UnknownCategory(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Notify(#[from] NotifyError),
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Trim and check a submission. All problems are reported together.
pub fn validate_new_session(input: NewSession) -> Result<NewSession, WorkflowError> {
    let session = NewSession {
        resident_name: input.resident_name.trim().to_string(),
        resident_email: input.resident_email.trim().to_string(),
        attending_name: input.attending_name.trim().to_string(),
        attending_email: input.attending_email.trim().to_string(),
        context: input
            .context
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        transcript: input.transcript.trim().to_string(),
    };

    let mut problems = Vec::new();
    if session.attending_name.is_empty() {
        problems.push("Attending name is required.");
    }
    if !is_valid_email(&session.attending_email) {
        problems.push("Attending email must be a valid email address.");
    }
    if session.resident_name.is_empty() {
        problems.push("Resident name is required.");
    }
    if !is_valid_email(&session.resident_email) {
        problems.push("Resident email must be a valid email address.");
    }
    if session.transcript.chars().count() < MIN_TRANSCRIPT_CHARS {
        problems.push("Transcript must be at least 20 characters.");
    }

    if problems.is_empty() {
        Ok(session)
    } else {
        Err(WorkflowError::Validation(problems.join(" ")))
    }
}

/// Validate and run the pipeline, producing an unsaved session. Blocks
/// while the external collaborator is consulted, so callers sharing a
/// connection should call this before taking the connection lock.
pub fn prepare_session(
    pipeline: &DraftPipeline,
    input: NewSession,
) -> Result<SessionRecord, WorkflowError> {
    let input = validate_new_session(input)?;
    let outcome = pipeline.run(&input.transcript, input.context.as_deref());

    let created_at = now();
    Ok(SessionRecord {
        id: Uuid::new_v4(),
        resident_name: input.resident_name,
        resident_email: input.resident_email,
        attending_name: input.attending_name,
        attending_email: input.attending_email,
        context: input.context,
        transcript_raw: input.transcript,
        category_id: outcome.draft.category_id.clone(),
        category_confidence: outcome.category_confidence(),
        entrustment: outcome.draft.entrustment,
        entrustment_confidence: outcome.entrustment_confidence(),
        transcript_deidentified: outcome.deidentification.deidentified,
        redactions: outcome.deidentification.redactions,
        draft: outcome.draft,
        approved: false,
        approved_at: None,
        email_status: EmailStatus::Created,
        email_error: None,
        email_sent_at: None,
        created_at,
        updated_at: created_at,
    })
}

pub fn store_session(conn: &Connection, session: &SessionRecord) -> Result<(), WorkflowError> {
    db::insert_session(conn, session)?;
    tracing::info!(
        session_id = %session.id,
        method = %session.draft.meta.method,
        redactions = session.redactions.len(),
        "Session created"
    );
    Ok(())
}

pub fn create_session_with_draft(
    conn: &Connection,
    pipeline: &DraftPipeline,
    input: NewSession,
) -> Result<SessionRecord, WorkflowError> {
    let session = prepare_session(pipeline, input)?;
    store_session(conn, &session)?;
    Ok(session)
}

pub fn load_session(conn: &Connection, id: &Uuid) -> Result<SessionRecord, WorkflowError> {
    db::get_session(conn, id)?.ok_or(WorkflowError::NotFound(*id))
}

/// Where review emails go and what they link to.
pub struct Mailer<'a> {
    pub notifier: &'a dyn Notifier,
    pub catalog: &'a CategoryCatalog,
    pub base_url: &'a str,
}

/// Send the stored draft to the attending. Success approves the session;
/// failure is recorded on the session and returned.
pub fn email_session_draft(
    conn: &Connection,
    mailer: &Mailer<'_>,
    id: &Uuid,
) -> Result<(), WorkflowError> {
    let session = load_session(conn, id)?;
    db::mark_email_pending(conn, id, &now())?;

    let message = render_draft_email(
        &DraftEmail {
            to: &session.attending_email,
            resident_name: &session.resident_name,
            attending_name: &session.attending_name,
            session_id: &session.id,
            base_url: mailer.base_url,
        },
        &session.draft,
        mailer.catalog,
    );

    match mailer.notifier.send(&message) {
        Ok(()) => {
            db::mark_email_sent(conn, id, &now())?;
            tracing::info!(session_id = %id, "Draft email sent");
            Ok(())
        }
        Err(e) => {
            db::mark_email_failed(conn, id, &e.to_string(), &now())?;
            tracing::warn!(session_id = %id, error = %e, "Draft email failed");
            Err(e.into())
        }
    }
}

/// Result of [`create_and_email`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAndEmailOutcome {
    pub id: Uuid,
    pub method: DraftMethod,
    pub draft_created: bool,
    pub emailed: bool,
    pub email_error: Option<String>,
    pub email_status: EmailStatus,
    pub draft: FeedbackDraft,
}

/// Create a session and immediately email its draft. An email failure is
/// reported in the outcome, not as an error.
pub fn create_and_email(
    conn: &Connection,
    pipeline: &DraftPipeline,
    mailer: &Mailer<'_>,
    input: NewSession,
) -> Result<CreateAndEmailOutcome, WorkflowError> {
    let session = prepare_session(pipeline, input)?;
    store_and_email(conn, mailer, session)
}

/// Store a prepared session and email its draft.
pub fn store_and_email(
    conn: &Connection,
    mailer: &Mailer<'_>,
    session: SessionRecord,
) -> Result<CreateAndEmailOutcome, WorkflowError> {
    store_session(conn, &session)?;

    let (emailed, email_error, email_status) = match email_session_draft(conn, mailer, &session.id)
    {
        Ok(()) => (true, None, EmailStatus::Sent),
        Err(WorkflowError::Notify(e)) => (false, Some(e.to_string()), EmailStatus::Failed),
        Err(e) => return Err(e),
    };

    Ok(CreateAndEmailOutcome {
        id: session.id,
        method: session.draft.meta.method,
        draft_created: true,
        emailed,
        email_error,
        email_status,
        draft: session.draft,
    })
}

/// Reviewer edit of a stored draft.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftEdit {
    pub draft: FeedbackDraft,
    #[serde(default)]
    pub category_confidence: Option<f64>,
    #[serde(default)]
    pub entrustment_confidence: Option<f64>,
}

fn validate_edit(edit: &DraftEdit, catalog: &CategoryCatalog) -> Result<(), WorkflowError> {
    if let Some(id) = &edit.draft.category_id {
        if !catalog.contains(id) {
            return Err(WorkflowError::UnknownCategory(id.clone()));
        }
    }

    let mut problems = Vec::new();
    for (field, value) in [
        ("categoryConfidence", edit.category_confidence),
        ("entrustmentConfidence", edit.entrustment_confidence),
    ] {
        if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
            problems.push(format!("{field} must be between 0 and 1."));
        }
    }
    for (field, items) in [
        ("strengths", &edit.draft.strengths),
        ("improvements", &edit.draft.improvements),
        ("nextSteps", &edit.draft.next_steps),
    ] {
        if items.iter().all(|s| s.trim().is_empty()) {
            problems.push(format!("{field} needs at least one item."));
        }
    }
    if edit.draft.summary_comment.trim().chars().count() < MIN_SUMMARY_CHARS {
        problems.push(format!(
            "summaryComment must be at least {MIN_SUMMARY_CHARS} characters."
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(problems.join(" ")))
    }
}

/// Replace the draft of an unapproved session. Confidences left out keep
/// their stored values.
pub fn update_draft(
    conn: &Connection,
    catalog: &CategoryCatalog,
    id: &Uuid,
    edit: DraftEdit,
) -> Result<SessionRecord, WorkflowError> {
    let session = load_session(conn, id)?;
    if session.approved {
        return Err(WorkflowError::AlreadyApproved);
    }
    validate_edit(&edit, catalog)?;

    db::update_session_draft(
        conn,
        id,
        &edit.draft,
        edit.category_confidence.unwrap_or(session.category_confidence),
        edit.entrustment_confidence.unwrap_or(session.entrustment_confidence),
        &now(),
    )?;
    tracing::info!(session_id = %id, "Draft edited");
    load_session(conn, id)
}

/// Approve a session. Approving twice keeps the first approval time.
pub fn approve(conn: &Connection, id: &Uuid) -> Result<SessionRecord, WorkflowError> {
    db::mark_session_approved(conn, id, &now()).map_err(|e| match e {
        DatabaseError::NotFound { .. } => WorkflowError::NotFound(*id),
        other => other.into(),
    })?;
    tracing::info!(session_id = %id, "Session approved");
    load_session(conn, id)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::example_transcripts;
    use crate::db::open_memory_database;
    use crate::models::enums::EntrustmentLevel;
    use crate::notify::MockNotifier;

    fn pipeline() -> DraftPipeline {
        DraftPipeline::new(Arc::new(CategoryCatalog::bundled().unwrap()))
    }

    fn acute_transcript() -> String {
        example_transcripts()
            .unwrap()
            .into_iter()
            .find(|e| e.id == "fod-1-acute")
            .unwrap()
            .transcript
    }

    fn input(transcript: &str) -> NewSession {
        NewSession {
            resident_name: "  Riley Resident ".into(),
            resident_email: "riley@example.org".into(),
            attending_name: "Alex Attending".into(),
            attending_email: " alex@example.org ".into(),
            context: Some("   ".into()),
            transcript: transcript.into(),
        }
    }

    fn mailer<'a>(notifier: &'a dyn Notifier, catalog: &'a CategoryCatalog) -> Mailer<'a> {
        Mailer {
            notifier,
            catalog,
            base_url: "http://localhost:3000",
        }
    }

    #[test]
    fn validation_trims_and_normalises() {
        let valid = validate_new_session(input("  a transcript that is long enough  ")).unwrap();
        assert_eq!(valid.resident_name, "Riley Resident");
        assert_eq!(valid.attending_email, "alex@example.org");
        assert_eq!(valid.context, None);
        assert_eq!(valid.transcript, "a transcript that is long enough");
    }

    #[test]
    fn validation_reports_every_problem() {
        let bad = NewSession {
            resident_name: " ".into(),
            resident_email: "nope".into(),
            attending_name: String::new(),
            attending_email: "also nope".into(),
            context: None,
            transcript: "   short transcript    ".into(),
        };
        let msg = validate_new_session(bad).unwrap_err().to_string();
        for expected in [
            "Attending name is required.",
            "Attending email must be a valid email address.",
            "Resident name is required.",
            "Resident email must be a valid email address.",
            "Transcript must be at least 20 characters.",
        ] {
            assert!(msg.contains(expected), "missing: {expected}");
        }
    }

    #[test]
    fn create_stores_draft_and_redactions() {
        let conn = open_memory_database().unwrap();
        let session = create_session_with_draft(&conn, &pipeline(), input(&acute_transcript())).unwrap();

        assert_eq!(session.email_status, EmailStatus::Created);
        assert_eq!(session.category_id.as_deref(), Some("FOD-1"));
        assert_eq!(session.category_id, session.draft.category_id);
        assert!(!session.approved);

        let stored = load_session(&conn, &session.id).unwrap();
        assert_eq!(stored, session);
    }

    #[test]
    fn create_rejects_invalid_input_without_storing() {
        let conn = open_memory_database().unwrap();
        let err = create_session_with_draft(&conn, &pipeline(), input("too short")).unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert!(db::list_sessions(&conn, 10).unwrap().is_empty());
    }

    #[test]
    fn short_but_valid_transcript_gets_insufficient_draft() {
        let conn = open_memory_database().unwrap();
        let session =
            create_session_with_draft(&conn, &pipeline(), input("Good job today, thanks. Bye now."))
                .unwrap();
        assert!(session.draft.is_insufficient());
        assert_eq!(session.category_id, None);
    }

    #[test]
    fn email_success_approves_session() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let notifier = MockNotifier::new();
        let session = create_session_with_draft(&conn, &pipeline, input(&acute_transcript())).unwrap();

        email_session_draft(&conn, &mailer(&notifier, pipeline.catalog()), &session.id).unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alex@example.org");
        assert!(sent[0].body.contains(&format!("/sessions/{}", session.id)));

        let stored = load_session(&conn, &session.id).unwrap();
        assert_eq!(stored.email_status, EmailStatus::Sent);
        assert!(stored.approved);
        assert!(stored.approved_at.is_some());
        assert!(stored.email_sent_at.is_some());
    }

    #[test]
    fn email_failure_is_recorded() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let notifier = MockNotifier::failing(NotifyError::NotConfigured);
        let session = create_session_with_draft(&conn, &pipeline, input(&acute_transcript())).unwrap();

        let err = email_session_draft(&conn, &mailer(&notifier, pipeline.catalog()), &session.id)
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Notify(NotifyError::NotConfigured)));

        let stored = load_session(&conn, &session.id).unwrap();
        assert_eq!(stored.email_status, EmailStatus::Failed);
        assert!(stored.email_error.unwrap().contains("not configured"));
        assert!(!stored.approved);
    }

    #[test]
    fn email_unknown_session_is_not_found() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let notifier = MockNotifier::new();
        let err = email_session_draft(&conn, &mailer(&notifier, pipeline.catalog()), &Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn create_and_email_reports_both_outcomes() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();

        let ok_notifier = MockNotifier::new();
        let ok = create_and_email(
            &conn,
            &pipeline,
            &mailer(&ok_notifier, pipeline.catalog()),
            input(&acute_transcript()),
        )
        .unwrap();
        assert!(ok.draft_created && ok.emailed);
        assert_eq!(ok.email_status, EmailStatus::Sent);
        assert_eq!(ok.method, DraftMethod::RuleBased);

        let bad_notifier = MockNotifier::failing(NotifyError::Io("disk full".into()));
        let failed = create_and_email(
            &conn,
            &pipeline,
            &mailer(&bad_notifier, pipeline.catalog()),
            input(&acute_transcript()),
        )
        .unwrap();
        assert!(failed.draft_created);
        assert!(!failed.emailed);
        assert_eq!(failed.email_status, EmailStatus::Failed);
        assert!(failed.email_error.unwrap().contains("disk full"));

        // The session survives the failed send.
        let stored = load_session(&conn, &failed.id).unwrap();
        assert_eq!(stored.email_status, EmailStatus::Failed);
        assert_eq!(db::list_sessions(&conn, 10).unwrap().len(), 2);
    }

    #[test]
    fn reviewer_edit_updates_draft() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let session = create_session_with_draft(&conn, &pipeline, input(&acute_transcript())).unwrap();

        let mut draft = session.draft.clone();
        draft.category_id = Some("FOD-5".into());
        draft.entrustment = EntrustmentLevel::Excellence;
        draft.summary_comment = "Reviewed and adjusted.".into();
        let edit = DraftEdit {
            draft: draft.clone(),
            category_confidence: Some(1.0),
            entrustment_confidence: None,
        };
        let updated = update_draft(&conn, pipeline.catalog(), &session.id, edit).unwrap();

        assert_eq!(updated.draft, draft);
        assert_eq!(updated.category_id.as_deref(), Some("FOD-5"));
        assert_eq!(updated.entrustment, EntrustmentLevel::Excellence);
        assert_eq!(updated.category_confidence, 1.0);
        assert_eq!(updated.entrustment_confidence, session.entrustment_confidence);
    }

    #[test]
    fn edit_rejects_unknown_category_and_bad_fields() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let session = create_session_with_draft(&conn, &pipeline, input(&acute_transcript())).unwrap();

        let mut draft = session.draft.clone();
        draft.category_id = Some("FOD-99".into());
        let err = update_draft(
            &conn,
            pipeline.catalog(),
            &session.id,
            DraftEdit {
                draft,
                category_confidence: None,
                entrustment_confidence: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownCategory(ref id) if id == "FOD-99"));

        let mut draft = session.draft.clone();
        draft.next_steps = vec![];
        draft.summary_comment = "ok".into();
        let err = update_draft(
            &conn,
            pipeline.catalog(),
            &session.id,
            DraftEdit {
                draft,
                category_confidence: Some(1.5),
                entrustment_confidence: None,
            },
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("categoryConfidence"));
        assert!(err.contains("nextSteps"));
        assert!(err.contains("summaryComment"));
    }

    #[test]
    fn edit_after_approval_rejected() {
        let conn = open_memory_database().unwrap();
        let pipeline = pipeline();
        let session = create_session_with_draft(&conn, &pipeline, input(&acute_transcript())).unwrap();

        let approved = approve(&conn, &session.id).unwrap();
        assert!(approved.approved);

        let err = update_draft(
            &conn,
            pipeline.catalog(),
            &session.id,
            DraftEdit {
                draft: session.draft.clone(),
                category_confidence: None,
                entrustment_confidence: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyApproved));
    }

    #[test]
    fn approve_is_idempotent_and_checks_existence() {
        let conn = open_memory_database().unwrap();
        let session = create_session_with_draft(&conn, &pipeline(), input(&acute_transcript())).unwrap();

        let first = approve(&conn, &session.id).unwrap();
        let second = approve(&conn, &session.id).unwrap();
        assert_eq!(first.approved_at, second.approved_at);

        assert!(matches!(
            approve(&conn, &Uuid::new_v4()),
            Err(WorkflowError::NotFound(_))
        ));
    }
}
