use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;
use crate::pipeline::redaction::RedactionRecord;

/// Storage format for timestamps. `%.f` keeps sub-second precision and
/// parses values written without a fraction.
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const SESSION_COLUMNS: &str = "id, resident_name, resident_email, attending_name, attending_email,
     context, transcript_raw, transcript_deidentified, redaction_report, category_id,
     category_confidence, entrustment, entrustment_confidence, draft_method, draft_json,
     approved, approved_at, email_status, email_error, email_sent_at, created_at, updated_at";

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(field: &str, value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("{field}: {e}")))
}

fn parse_optional_datetime(
    field: &str,
    value: Option<String>,
) -> Result<Option<NaiveDateTime>, DatabaseError> {
    value.map(|v| parse_datetime(field, &v)).transpose()
}

fn not_found(id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: "Session".into(),
        id: id.to_string(),
    }
}

pub fn insert_session(conn: &Connection, session: &SessionRecord) -> Result<(), DatabaseError> {
    let redaction_report = serde_json::to_string(&session.redactions)?;
    let draft_json = session.draft.to_json()?;

    conn.execute(
        &format!(
            "INSERT INTO sessions ({SESSION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
        ),
        params![
            session.id.to_string(),
            session.resident_name,
            session.resident_email,
            session.attending_name,
            session.attending_email,
            session.context,
            session.transcript_raw,
            session.transcript_deidentified,
            redaction_report,
            session.category_id,
            session.category_confidence,
            session.entrustment.as_str(),
            session.entrustment_confidence,
            session.draft.meta.method.as_str(),
            draft_json,
            session.approved as i32,
            session.approved_at.as_ref().map(format_datetime),
            session.email_status.as_str(),
            session.email_error,
            session.email_sent_at.as_ref().map(format_datetime),
            format_datetime(&session.created_at),
            format_datetime(&session.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, id: &Uuid) -> Result<Option<SessionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
    ))?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(SessionRow {
            id: row.get(0)?,
            resident_name: row.get(1)?,
            resident_email: row.get(2)?,
            attending_name: row.get(3)?,
            attending_email: row.get(4)?,
            context: row.get(5)?,
            transcript_raw: row.get(6)?,
            transcript_deidentified: row.get(7)?,
            redaction_report: row.get(8)?,
            category_id: row.get(9)?,
            category_confidence: row.get(10)?,
            entrustment: row.get(11)?,
            entrustment_confidence: row.get(12)?,
            draft_json: row.get(14)?,
            approved: row.get(15)?,
            approved_at: row.get(16)?,
            email_status: row.get(17)?,
            email_error: row.get(18)?,
            email_sent_at: row.get(19)?,
            created_at: row.get(20)?,
            updated_at: row.get(21)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(session_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Most recent sessions first.
pub fn list_sessions(conn: &Connection, limit: u32) -> Result<Vec<SessionSummary>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, resident_name, attending_name, category_id, entrustment,
         approved, email_status, created_at
         FROM sessions ORDER BY created_at DESC, id LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, resident_name, attending_name, category_id, entrustment, approved, status, created) =
            row?;
        summaries.push(SessionSummary {
            id: Uuid::parse_str(&id)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
            resident_name,
            attending_name,
            category_id,
            entrustment: EntrustmentLevel::from_str(&entrustment)?,
            approved: approved != 0,
            email_status: EmailStatus::from_str(&status)?,
            created_at: parse_datetime("created_at", &created)?,
        });
    }
    Ok(summaries)
}

/// Replace the stored draft. Category and entrustment columns follow the
/// draft; confidences are passed separately since reviewers may leave them.
pub fn update_session_draft(
    conn: &Connection,
    id: &Uuid,
    draft: &FeedbackDraft,
    category_confidence: f64,
    entrustment_confidence: f64,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE sessions SET category_id = ?2, category_confidence = ?3, entrustment = ?4,
         entrustment_confidence = ?5, draft_method = ?6, draft_json = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            id.to_string(),
            draft.category_id,
            category_confidence,
            draft.entrustment.as_str(),
            entrustment_confidence,
            draft.meta.method.as_str(),
            draft.to_json()?,
            format_datetime(now),
        ],
    )?;
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// Mark approved. An existing approval time is kept.
pub fn mark_session_approved(
    conn: &Connection,
    id: &Uuid,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let stamp = format_datetime(now);
    let rows = conn.execute(
        "UPDATE sessions SET approved = 1, approved_at = COALESCE(approved_at, ?2), updated_at = ?2
         WHERE id = ?1",
        params![id.to_string(), stamp],
    )?;
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

/// `email_pending`, clearing any previous error.
pub fn mark_email_pending(
    conn: &Connection,
    id: &Uuid,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_email_state(conn, id, EmailStatus::Pending, None, now)
}

/// `email_failed` with the delivery error. The sent time is cleared.
pub fn mark_email_failed(
    conn: &Connection,
    id: &Uuid,
    error: &str,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    update_email_state(conn, id, EmailStatus::Failed, Some(error), now)
}

/// `email_sent`. Sending a draft also approves it.
pub fn mark_email_sent(
    conn: &Connection,
    id: &Uuid,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let stamp = format_datetime(now);
    let rows = conn.execute(
        "UPDATE sessions SET email_status = ?2, email_error = NULL, email_sent_at = ?3,
         approved = 1, approved_at = COALESCE(approved_at, ?3), updated_at = ?3
         WHERE id = ?1",
        params![id.to_string(), EmailStatus::Sent.as_str(), stamp],
    )?;
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

fn update_email_state(
    conn: &Connection,
    id: &Uuid,
    status: EmailStatus,
    error: Option<&str>,
    now: &NaiveDateTime,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE sessions SET email_status = ?2, email_error = ?3, email_sent_at = NULL, updated_at = ?4
         WHERE id = ?1",
        params![id.to_string(), status.as_str(), error, format_datetime(now)],
    )?;
    if rows == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

struct SessionRow {
    id: String,
    resident_name: String,
    resident_email: String,
    attending_name: String,
    attending_email: String,
    context: Option<String>,
    transcript_raw: String,
    transcript_deidentified: String,
    redaction_report: String,
    category_id: Option<String>,
    category_confidence: f64,
    entrustment: String,
    entrustment_confidence: f64,
    draft_json: String,
    approved: i32,
    approved_at: Option<String>,
    email_status: String,
    email_error: Option<String>,
    email_sent_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn session_from_row(row: SessionRow) -> Result<SessionRecord, DatabaseError> {
    let redactions: Vec<RedactionRecord> = serde_json::from_str(&row.redaction_report)?;

    Ok(SessionRecord {
        id: Uuid::parse_str(&row.id).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        resident_name: row.resident_name,
        resident_email: row.resident_email,
        attending_name: row.attending_name,
        attending_email: row.attending_email,
        context: row.context,
        transcript_raw: row.transcript_raw,
        transcript_deidentified: row.transcript_deidentified,
        redactions,
        category_id: row.category_id,
        category_confidence: row.category_confidence,
        entrustment: EntrustmentLevel::from_str(&row.entrustment)?,
        entrustment_confidence: row.entrustment_confidence,
        draft: FeedbackDraft::from_json(&row.draft_json)?,
        approved: row.approved != 0,
        approved_at: parse_optional_datetime("approved_at", row.approved_at)?,
        email_status: EmailStatus::from_str(&row.email_status)?,
        email_error: row.email_error,
        email_sent_at: parse_optional_datetime("email_sent_at", row.email_sent_at)?,
        created_at: parse_datetime("created_at", &row.created_at)?,
        updated_at: parse_datetime("updated_at", &row.updated_at)?,
    })
}
