//! Category catalog and example transcripts.
//!
//! - `GET /api/epas` — catalog entries sorted by id
//! - `GET /api/examples` — bundled example conversations

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::catalog::{example_transcripts, CatalogEntry, ExampleTranscript};

/// `GET /api/epas`
pub async fn epas(State(ctx): State<ApiContext>) -> Json<Vec<CatalogEntry>> {
    Json(ctx.pipeline.catalog().sorted().into_iter().cloned().collect())
}

/// `GET /api/examples`
pub async fn examples() -> Result<Json<Vec<ExampleTranscript>>, ApiError> {
    let examples = example_transcripts().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(examples))
}
