//! Notification collaborator: renders a draft into a plain-text email and
//! hands it to a [`Notifier`].
//!
//! The bundled [`OutboxNotifier`] spools each message as an `.eml` file into
//! a directory that a mail relay picks up. Delivery itself is outside this
//! crate.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CategoryCatalog;
use crate::models::draft::FeedbackDraft;

static EMAIL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("Email not configured. Set MAIL_FROM to enable sending.")]
    NotConfigured,

    #[error("Could not write message: {0}")]
    Io(String),

    #[error("Invalid recipient email address")]
    InvalidAddress,
}

impl From<std::io::Error> for NotifyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Loose address check: one `@`, no whitespace, a dot in the domain.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_ADDRESS.is_match(address)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Names and link inputs for [`render_draft_email`].
pub struct DraftEmail<'a> {
    pub to: &'a str,
    pub resident_name: &'a str,
    pub attending_name: &'a str,
    pub session_id: &'a Uuid,
    pub base_url: &'a str,
}

/// Review link for a session.
pub fn session_link(base_url: &str, session_id: &Uuid) -> String {
    format!("{}/sessions/{}", base_url.trim_end_matches('/'), session_id)
}

/// Render the review email for a draft. The subject carries the bare
/// category id; the body uses the catalog label.
pub fn render_draft_email(
    email: &DraftEmail<'_>,
    draft: &FeedbackDraft,
    catalog: &CategoryCatalog,
) -> EmailMessage {
    let subject = format!(
        "Draft EPA Feedback ({}) – Please review",
        draft.category_id.as_deref().unwrap_or("Unmapped")
    );

    let mut lines = vec![
        format!("Hi {},", email.resident_name),
        String::new(),
        format!(
            "This is a draft feedback form generated from a teaching/feedback conversation with {}.",
            email.attending_name
        ),
        "Please note: This draft is provided for transparency and is subject to attending review/edits."
            .to_string(),
        String::new(),
        format!("EPA: {}", catalog.label(draft.category_id.as_deref())),
        format!("Entrustment: {}", draft.entrustment),
        String::new(),
        "Strengths:".to_string(),
    ];
    lines.extend(bullets(&draft.strengths));
    lines.push(String::new());
    lines.push("Areas to improve:".to_string());
    lines.extend(bullets(&draft.improvements));
    lines.push(String::new());
    lines.push("Next steps:".to_string());
    lines.extend(bullets(&draft.next_steps));
    lines.push(String::new());
    lines.push(format!(
        "Review link: {}",
        session_link(email.base_url, email.session_id)
    ));
    lines.push(String::new());
    lines.push(format!("— {}", email.attending_name));

    EmailMessage {
        to: email.to.to_string(),
        subject: single_line(&subject),
        body: lines.join("\n"),
    }
}

fn bullets(items: &[String]) -> Vec<String> {
    items.iter().map(|s| format!("- {s}")).collect()
}

/// Header values must not carry line breaks.
fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Delivers rendered messages.
pub trait Notifier: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;

    fn is_configured(&self) -> bool;
}

/// Writes each message as an RFC 5322 text file into an outbox directory.
/// Files appear atomically: they are written to a temp file in the same
/// directory and then renamed.
pub struct OutboxNotifier {
    from: Option<String>,
    dir: PathBuf,
}

impl OutboxNotifier {
    pub fn new(from: Option<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            from,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn render(from: &str, message: &EmailMessage) -> String {
        format!(
            "From: {from}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}\r\n",
            message.to,
            message.subject,
            chrono::Utc::now().to_rfc2822(),
            message.body.replace('\n', "\r\n"),
        )
    }
}

impl Notifier for OutboxNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let from = self.from.as_deref().ok_or(NotifyError::NotConfigured)?;
        if !is_valid_email(&message.to) {
            return Err(NotifyError::InvalidAddress);
        }

        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(Self::render(from, message).as_bytes())?;
        file.flush()?;

        let name = format!(
            "{}-{}.eml",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%3f"),
            Uuid::new_v4()
        );
        file.persist(self.dir.join(&name))
            .map_err(|e| NotifyError::from(e.error))?;

        tracing::info!(file = %name, "Draft email spooled to outbox");
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.from.is_some()
    }
}

/// In-memory notifier for tests and dry runs.
pub struct MockNotifier {
    failure: Option<NotifyError>,
    sent: Mutex<Vec<EmailMessage>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            failure: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Every send fails with `error`.
    pub fn failing(error: NotifyError) -> Self {
        Self {
            failure: Some(error),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MockNotifier {
    fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.failure != Some(NotifyError::NotConfigured)
    }
}
