//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub external_analysis: bool,
    pub email_configured: bool,
    pub categories: usize,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        external_analysis: ctx.pipeline.has_external(),
        email_configured: ctx.notifier.is_configured(),
        categories: ctx.pipeline.catalog().len(),
    })
}
