//! HTTP front end for the governance daemon
//!
//! Axum-based JSON API. Handlers validate and enqueue; the event pipeline
//! does the actual registry work.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
