//! Repository layer: entity-scoped database operations.

mod session;

pub use session::*;
