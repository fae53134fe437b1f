//! API endpoint handlers, one module per resource.

pub mod catalog;
pub mod health;
pub mod sessions;
