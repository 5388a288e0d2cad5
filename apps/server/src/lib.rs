//! HTTP surface of LineupRelay: axum router, handlers and error mapping.

pub mod error;
pub mod handlers;
pub mod routes;

pub use error::ApiError;
pub use routes::{AppState, build_router};
