//! HTTP router. All routes are nested under `/api/`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/epas", get(endpoints::catalog::epas))
        .route("/examples", get(endpoints::catalog::examples))
        .route(
            "/sessions",
            get(endpoints::sessions::list).post(endpoints::sessions::create),
        )
        .route(
            "/sessions/draft-and-email",
            post(endpoints::sessions::draft_and_email),
        )
        .route("/sessions/:id", get(endpoints::sessions::detail))
        .route("/sessions/:id/draft", put(endpoints::sessions::update_draft))
        .route("/sessions/:id/approve", post(endpoints::sessions::approve))
        .route("/sessions/:id/email", post(endpoints::sessions::email))
        .with_state(ctx);

    Router::new().nest("/api", api)
}
