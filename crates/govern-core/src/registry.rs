//! Domain operations over the dual-layer store

use std::sync::Arc;

use chrono::Utc;
use govern_db::{service_key, ServiceInfo, ServiceRegistration, ServiceStatus};
use tracing::debug;

use crate::store::DualStore;

/// Domain façade over [`DualStore`].
///
/// Mutating methods are called only from the single event-worker path, so
/// the registry itself holds no coordination state; reads may come from any
/// task and observe a consistent snapshot.
pub struct Registry {
    store: Arc<DualStore>,
}

impl Registry {
    pub fn new(store: Arc<DualStore>) -> Self {
        Self { store }
    }

    /// Add or replace a service registration.
    ///
    /// A re-registration under the same key first retracts the previous
    /// incarnation's subscriptions from the index, so no stale entries
    /// survive. The fresh entry always starts with `Unknown` status.
    pub async fn register(&self, registration: ServiceRegistration) -> ServiceInfo {
        let service = ServiceInfo {
            service_name: registration.service_name,
            pod_name: registration.pod_name,
            providers: registration.providers,
            health_check_url: registration.health_check_url,
            notification_url: registration.notification_url,
            subscriptions: registration.subscriptions,
            status: ServiceStatus::Unknown,
            last_health_check: None,
            registered_at: Utc::now(),
        };
        let key = service.key();

        if let Some(previous) = self.store.get_service(&key) {
            debug!("Re-registration of {}, retracting old subscriptions", key);
            self.store
                .remove_subscriptions(&key, &previous.subscriptions)
                .await;
        }

        self.store.save_service(&service).await;
        self.store
            .save_subscriptions(&key, &service.subscriptions)
            .await;

        service
    }

    /// Remove a service, returning the removed entry. Unknown keys no-op.
    pub async fn unregister(&self, service_name: &str, pod_name: &str) -> Option<ServiceInfo> {
        let key = service_key(service_name, pod_name);

        let service = self.store.get_service(&key)?;
        self.store
            .remove_subscriptions(&key, &service.subscriptions)
            .await;
        self.store.delete_service(&key).await
    }

    pub fn get(&self, key: &str) -> Option<ServiceInfo> {
        self.store.get_service(key)
    }

    /// All pods of a service group
    pub fn get_by_service_name(&self, service_name: &str) -> Vec<ServiceInfo> {
        self.store.get_services_by_name(service_name)
    }

    pub fn get_all_services(&self) -> Vec<ServiceInfo> {
        self.store.get_all_services()
    }

    /// Snapshot of all registered composite keys
    pub fn service_keys(&self) -> Vec<String> {
        self.store.service_keys()
    }

    /// Record the outcome of a health probe.
    ///
    /// The last-check timestamp is refreshed on every call; the return value
    /// is true iff the status value actually changed. Unknown keys return
    /// false.
    pub async fn update_health_status(&self, key: &str, status: ServiceStatus) -> bool {
        match self
            .store
            .update_health_status(key, status, Utc::now())
            .await
        {
            Some(previous) => previous != status,
            None => false,
        }
    }

    /// Full service entries of every subscriber of a group. Dangling index
    /// entries (subscriber no longer registered) are silently skipped.
    pub fn get_subscriber_services(&self, service_group: &str) -> Vec<ServiceInfo> {
        self.store
            .get_subscribers(service_group)
            .iter()
            .filter_map(|key| self.store.get_service(key))
            .collect()
    }
}
