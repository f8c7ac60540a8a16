//! Persistence layer for the governance daemon
//!
//! This crate provides the shared domain models, the [`DatabaseStore`]
//! interface consumed by the coordination kernel, and a SQLite
//! implementation via sqlx.

pub mod error;
pub mod models;
pub mod sqlite;
pub mod store;

pub use error::DbError;
pub use models::*;
pub use sqlite::SqliteDatabase;
pub use store::DatabaseStore;

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
