//! Typed pipeline events

use govern_db::ServiceRegistration;

/// Queue handler registry keys, one per event kind
pub mod kinds {
    pub const REGISTER: &str = "register";
    pub const UNREGISTER: &str = "unregister";
    pub const HEALTH_CHECK: &str = "healthcheck";
    pub const RECONCILE: &str = "reconcile";
}

/// A mutation request travelling through the single-consumer pipeline.
///
/// The first two kinds originate from the HTTP front end; `HealthCheck` and
/// `Reconcile` are produced by the schedulers.
#[derive(Debug, Clone)]
pub enum Event {
    Register(ServiceRegistration),
    Unregister {
        service_name: String,
        pod_name: String,
    },
    HealthCheck {
        service_key: String,
    },
    Reconcile,
}

impl Event {
    /// The handler-registry key for this event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Register(_) => kinds::REGISTER,
            Event::Unregister { .. } => kinds::UNREGISTER,
            Event::HealthCheck { .. } => kinds::HEALTH_CHECK,
            Event::Reconcile => kinds::RECONCILE,
        }
    }
}
