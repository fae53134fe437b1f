//! External classification collaborator.
//!
//! An OpenAI-compatible chat model may produce the whole analysis in one
//! call. Its reply is untrusted: it is parsed against a strict schema, its
//! category ids are checked against the catalog and its quotes are checked
//! against the transcript before any field reaches a draft. Every failure here
//! is recoverable; the orchestrator falls back to the rule-based path.

pub mod analyzer;
pub mod client;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod types;
pub mod validation;

pub use analyzer::*;
pub use client::*;
pub use parser::*;
pub use prompt::*;
pub use sanitize::*;
pub use types::*;
pub use validation::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalError {
    #[error("External analysis is not configured")]
    NotConfigured,

    #[error("Could not reach the analysis service at {0}")]
    Connection(String),

    #[error("Analysis request timed out after {0}s")]
    Timeout(u64),

    #[error("Analysis service returned error (status {status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Analysis response violates schema: {0}")]
    SchemaViolation(String),
}

impl ExternalError {
    /// Transport-level failures worth one more attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) | Self::HttpClient(_) => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Reply-content failures; a fresh call may produce a valid reply.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_) | Self::JsonParsing(_) | Self::SchemaViolation(_)
        )
    }

    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::HttpClient(_) => "http_client",
            Self::MalformedResponse(_) => "malformed_response",
            Self::JsonParsing(_) => "json_parsing",
            Self::SchemaViolation(_) => "schema_violation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(ExternalError::Connection("x".into()).is_retryable());
        assert!(ExternalError::Timeout(60).is_retryable());
        assert!(ExternalError::HttpStatus { status: 503, body: String::new() }.is_retryable());
        assert!(ExternalError::HttpStatus { status: 429, body: String::new() }.is_retryable());
        assert!(!ExternalError::HttpStatus { status: 401, body: String::new() }.is_retryable());
        assert!(!ExternalError::NotConfigured.is_retryable());
        assert!(!ExternalError::JsonParsing("x".into()).is_retryable());
    }

    #[test]
    fn parse_classification() {
        assert!(ExternalError::MalformedResponse("x".into()).is_parse_error());
        assert!(ExternalError::JsonParsing("x".into()).is_parse_error());
        assert!(ExternalError::SchemaViolation("x".into()).is_parse_error());
        assert!(!ExternalError::Timeout(1).is_parse_error());
    }

    #[test]
    fn error_display_includes_status() {
        let e = ExternalError::HttpStatus { status: 500, body: "boom".into() };
        assert_eq!(e.to_string(), "Analysis service returned error (status 500): boom");
    }
}
