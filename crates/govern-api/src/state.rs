//! Application state

use std::sync::Arc;
use std::time::Duration;

use govern_core::{EventQueue, Registry};

/// Type alias for the Prometheus metrics handle
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// State shared across handlers.
///
/// Handlers never mutate the registry directly: every mutation goes through
/// the event queue, reads take a snapshot.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub queue: Arc<EventQueue>,
    /// Deadline a handler is willing to wait for a free queue slot before
    /// answering 503
    pub enqueue_timeout: Duration,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, queue: Arc<EventQueue>, enqueue_timeout: Duration) -> Self {
        Self {
            registry,
            queue,
            enqueue_timeout,
        }
    }
}
