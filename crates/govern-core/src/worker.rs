//! Event worker: consumes pipeline events and drives the registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use govern_db::{EventType, ServiceInfo, ServiceRegistration};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::events::{kinds, Event};
use crate::health::HealthChecker;
use crate::notifier::{build_notification_payload, Notifier};
use crate::queue::{EventHandler, EventQueue};
use crate::registry::Registry;
use crate::store::DualStore;

/// Executes domain logic for each event kind and triggers subscriber
/// fan-out.
///
/// All four handlers run on the queue's single consumer, so every handler
/// observes the cumulative effect of all earlier-dequeued events; that
/// serialization is what makes the registry linearizable as seen by
/// subscribers.
pub struct EventWorker {
    registry: Arc<Registry>,
    notifier: Arc<Notifier>,
    health_checker: Arc<HealthChecker>,
    store: Arc<DualStore>,
}

impl EventWorker {
    pub fn new(
        registry: Arc<Registry>,
        notifier: Arc<Notifier>,
        health_checker: Arc<HealthChecker>,
        store: Arc<DualStore>,
    ) -> Self {
        Self {
            registry,
            notifier,
            health_checker,
            store,
        }
    }

    /// Register one handler per event kind on the queue
    pub fn register_handlers(self: &Arc<Self>, queue: &EventQueue) {
        queue.register_handler(kinds::REGISTER, Arc::new(RegisterHandler(self.clone())));
        queue.register_handler(kinds::UNREGISTER, Arc::new(UnregisterHandler(self.clone())));
        queue.register_handler(
            kinds::HEALTH_CHECK,
            Arc::new(HealthCheckHandler(self.clone())),
        );
        queue.register_handler(kinds::RECONCILE, Arc::new(ReconcileHandler(self.clone())));
    }

    /// Notify the subscribers of a group with its current full membership
    fn fan_out(&self, service_name: &str, event_type: EventType) {
        let pods = self.registry.get_by_service_name(service_name);
        let subscribers = self.registry.get_subscriber_services(service_name);
        if subscribers.is_empty() {
            return;
        }
        let payload = build_notification_payload(service_name, event_type, &pods);
        self.notifier.notify_subscribers(&subscribers, &payload);
    }

    async fn handle_register(&self, registration: ServiceRegistration) -> Result<(), CoreError> {
        let service = self.registry.register(registration).await;
        debug!("Registered {}", service.key());
        self.fan_out(&service.service_name, EventType::Register);
        Ok(())
    }

    async fn handle_unregister(
        &self,
        service_name: String,
        pod_name: String,
    ) -> Result<(), CoreError> {
        match self.registry.unregister(&service_name, &pod_name).await {
            Some(removed) => {
                debug!("Unregistered {}", removed.key());
                self.fan_out(&service_name, EventType::Unregister);
            }
            None => {
                debug!("Unregister of unknown service {}:{}", service_name, pod_name);
            }
        }
        Ok(())
    }

    async fn handle_health_check(&self, service_key: String) -> Result<(), CoreError> {
        let Some(service) = self.registry.get(&service_key) else {
            debug!("Health check for unknown service {}", service_key);
            return Ok(());
        };

        let status = self
            .health_checker
            .get_health_status(&service.health_check_url)
            .await;

        let changed = self.registry.update_health_status(&service_key, status).await;
        if changed {
            debug!(
                "Health status of {} changed to {}",
                service_key,
                status.as_str()
            );
            self.fan_out(&service.service_name, EventType::Update);
        }
        Ok(())
    }

    async fn handle_reconcile(&self) -> Result<(), CoreError> {
        if self.store.has_database() {
            if let Err(e) = self.store.sync_from_database().await {
                warn!("Reconcile resync from database failed: {}", e);
            }
        }

        let mut groups: HashMap<String, Vec<ServiceInfo>> = HashMap::new();
        for service in self.registry.get_all_services() {
            groups
                .entry(service.service_name.clone())
                .or_default()
                .push(service);
        }

        for (service_name, pods) in groups {
            let subscribers = self.registry.get_subscriber_services(&service_name);
            if subscribers.is_empty() {
                continue;
            }
            let payload =
                build_notification_payload(&service_name, EventType::Reconcile, &pods);
            self.notifier.notify_subscribers(&subscribers, &payload);
        }
        Ok(())
    }
}

struct RegisterHandler(Arc<EventWorker>);

#[async_trait]
impl EventHandler for RegisterHandler {
    async fn handle(&self, event: Event) -> Result<(), CoreError> {
        match event {
            Event::Register(registration) => self.0.handle_register(registration).await,
            _ => Ok(()),
        }
    }
}

struct UnregisterHandler(Arc<EventWorker>);

#[async_trait]
impl EventHandler for UnregisterHandler {
    async fn handle(&self, event: Event) -> Result<(), CoreError> {
        match event {
            Event::Unregister {
                service_name,
                pod_name,
            } => self.0.handle_unregister(service_name, pod_name).await,
            _ => Ok(()),
        }
    }
}

struct HealthCheckHandler(Arc<EventWorker>);

#[async_trait]
impl EventHandler for HealthCheckHandler {
    async fn handle(&self, event: Event) -> Result<(), CoreError> {
        match event {
            Event::HealthCheck { service_key } => self.0.handle_health_check(service_key).await,
            _ => Ok(()),
        }
    }
}

struct ReconcileHandler(Arc<EventWorker>);

#[async_trait]
impl EventHandler for ReconcileHandler {
    async fn handle(&self, event: Event) -> Result<(), CoreError> {
        match event {
            Event::Reconcile => self.0.handle_reconcile().await,
            _ => Ok(()),
        }
    }
}
