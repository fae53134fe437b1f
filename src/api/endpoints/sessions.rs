//! Session endpoints.
//!
//! - `POST /api/sessions` — create a session and its draft
//! - `GET /api/sessions` — recent sessions, newest first
//! - `GET /api/sessions/:id` — full session
//! - `PUT /api/sessions/:id/draft` — reviewer edit
//! - `POST /api/sessions/:id/approve`
//! - `POST /api/sessions/:id/email` — send the draft to the attending
//! - `POST /api/sessions/draft-and-email` — create and send in one call

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{
    parse_session_id, ApiContext, CreateSessionResponse, EmailResponse, ListQuery,
};
use crate::db;
use crate::models::enums::EmailStatus;
use crate::models::session::{NewSession, SessionRecord, SessionSummary};
use crate::workflow::{self, CreateAndEmailOutcome, DraftEdit};

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

/// Validate and draft off the connection lock; the external call may take
/// a while.
async fn prepare(ctx: &ApiContext, input: NewSession) -> Result<SessionRecord, ApiError> {
    let pipeline = ctx.pipeline.clone();
    let session =
        tokio::task::spawn_blocking(move || workflow::prepare_session(&pipeline, input)).await??;
    Ok(session)
}

/// `POST /api/sessions`
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Result<Json<NewSession>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let Json(input) = body?;
    let session = prepare(&ctx, input).await?;

    ctx.with_db(move |conn, _| {
        workflow::store_session(conn, &session)?;
        Ok(Json(CreateSessionResponse {
            id: session.id,
            method: session.draft.meta.method,
            insufficient_evidence: session.draft.is_insufficient(),
            draft: session.draft,
        }))
    })
    .await
}

/// `GET /api/sessions`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    ctx.with_db(move |conn, _| Ok(Json(db::list_sessions(conn, limit)?)))
        .await
}

/// `GET /api/sessions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, ApiError> {
    let id = parse_session_id(&id)?;
    ctx.with_db(move |conn, _| Ok(Json(workflow::load_session(conn, &id)?)))
        .await
}

/// `PUT /api/sessions/:id/draft`
pub async fn update_draft(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Result<Json<DraftEdit>, JsonRejection>,
) -> Result<Json<SessionRecord>, ApiError> {
    let id = parse_session_id(&id)?;
    let Json(edit) = body?;
    ctx.with_db(move |conn, ctx| {
        Ok(Json(workflow::update_draft(
            conn,
            ctx.pipeline.catalog(),
            &id,
            edit,
        )?))
    })
    .await
}

/// `POST /api/sessions/:id/approve`
pub async fn approve(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, ApiError> {
    let id = parse_session_id(&id)?;
    ctx.with_db(move |conn, _| Ok(Json(workflow::approve(conn, &id)?)))
        .await
}

/// `POST /api/sessions/:id/email`
///
/// A failed send answers 502; the failure is also stored on the session.
pub async fn email(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<EmailResponse>, ApiError> {
    let id = parse_session_id(&id)?;
    ctx.with_db(move |conn, ctx| {
        workflow::email_session_draft(conn, &ctx.mailer(), &id)?;
        Ok(Json(EmailResponse {
            id,
            email_status: EmailStatus::Sent,
        }))
    })
    .await
}

/// `POST /api/sessions/draft-and-email`
pub async fn draft_and_email(
    State(ctx): State<ApiContext>,
    body: Result<Json<NewSession>, JsonRejection>,
) -> Result<Json<CreateAndEmailOutcome>, ApiError> {
    let Json(input) = body?;
    let session = prepare(&ctx, input).await?;

    ctx.with_db(move |conn, ctx| Ok(Json(workflow::store_and_email(conn, &ctx.mailer(), session)?)))
        .await
}
