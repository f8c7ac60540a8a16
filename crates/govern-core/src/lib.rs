//! Coordination kernel of the governance daemon
//!
//! A single-consumer event pipeline linearizes every registry mutation
//! against a dual-layer store (authoritative in-memory cache plus optional
//! persistent mirror), and two periodic control loops (health probing and
//! reconcile fan-out) feed the same pipeline.

pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod notifier;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use config::ManagerConfig;
pub use error::CoreError;
pub use events::Event;
pub use health::HealthChecker;
pub use notifier::{build_notification_payload, Notifier};
pub use queue::{EventHandler, EventQueue, EventQueueConfig};
pub use registry::Registry;
pub use scheduler::{HealthCheckScheduler, ReconcileScheduler};
pub use store::{CacheStore, DualStore};
pub use worker::EventWorker;
