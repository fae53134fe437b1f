//! Shared state and request/response types for the HTTP layer.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::draft::FeedbackDraft;
use crate::models::enums::{DraftMethod, EmailStatus};
use crate::notify::Notifier;
use crate::pipeline::DraftPipeline;
use crate::workflow::Mailer;

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Arc<Mutex<Connection>>,
    pub pipeline: Arc<DraftPipeline>,
    pub notifier: Arc<dyn Notifier>,
    pub base_url: Arc<str>,
}

impl ApiContext {
    pub fn new(
        conn: Connection,
        pipeline: DraftPipeline,
        notifier: Arc<dyn Notifier>,
        base_url: &str,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            pipeline: Arc::new(pipeline),
            notifier,
            base_url: Arc::from(base_url),
        }
    }

    /// Run `f` on the blocking pool with the connection locked.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &ApiContext) -> Result<T, ApiError> + Send + 'static,
    {
        let ctx = self.clone();
        tokio::task::spawn_blocking(move || {
            let conn = ctx
                .db
                .lock()
                .map_err(|_| ApiError::Internal("database lock poisoned".into()))?;
            f(&conn, &ctx)
        })
        .await?
    }

    pub fn mailer(&self) -> Mailer<'_> {
        Mailer {
            notifier: self.notifier.as_ref(),
            catalog: self.pipeline.catalog(),
            base_url: &self.base_url,
        }
    }
}

/// Parse a path id.
pub fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid session id".into()))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub id: Uuid,
    pub method: DraftMethod,
    pub insufficient_evidence: bool,
    pub draft: FeedbackDraft,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailResponse {
    pub id: Uuid,
    pub email_status: EmailStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}
