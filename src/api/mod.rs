//! HTTP API over the session workflow.
//!
//! Routes are nested under `/api/`. Handlers move database work and the
//! drafting pipeline onto the blocking pool.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
