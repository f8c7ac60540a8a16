//! Authoritative in-memory registry state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use govern_db::{ServiceInfo, ServiceStatus};
use parking_lot::RwLock;

/// In-memory registry: the authoritative store at runtime.
///
/// Mutations only ever arrive from the single event worker; the locks exist
/// so that HTTP snapshot reads can run concurrently with it. The
/// subscription index maps a service group to the keys of its subscribers;
/// the inverse relation lives in each subscriber's `ServiceInfo`.
pub struct CacheStore {
    services: RwLock<HashMap<String, ServiceInfo>>,
    subscriptions: RwLock<HashMap<String, Vec<String>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    /// Store or replace a service entry
    pub fn save_service(&self, service: ServiceInfo) {
        self.services.write().insert(service.key(), service);
    }

    /// Fetch a single service by composite key
    pub fn get_service(&self, key: &str) -> Option<ServiceInfo> {
        self.services.read().get(key).cloned()
    }

    /// Fetch all pods of a service group
    pub fn get_services_by_name(&self, service_name: &str) -> Vec<ServiceInfo> {
        self.services
            .read()
            .values()
            .filter(|s| s.service_name == service_name)
            .cloned()
            .collect()
    }

    /// Snapshot of every registered service
    pub fn get_all_services(&self) -> Vec<ServiceInfo> {
        self.services.read().values().cloned().collect()
    }

    /// Snapshot of every registered composite key
    pub fn service_keys(&self) -> Vec<String> {
        self.services.read().keys().cloned().collect()
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Remove a service entry, returning it if present
    pub fn delete_service(&self, key: &str) -> Option<ServiceInfo> {
        self.services.write().remove(key)
    }

    /// Set the health status and last-check timestamp of a service.
    /// Returns the previous status, or None if the key is unknown.
    pub fn update_health_status(
        &self,
        key: &str,
        status: ServiceStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<ServiceStatus> {
        let mut services = self.services.write();
        let service = services.get_mut(key)?;
        let previous = service.status;
        service.status = status;
        service.last_health_check = Some(timestamp);
        Some(previous)
    }

    /// Add a subscriber to each of the given service groups
    pub fn add_subscriptions(&self, subscriber_key: &str, groups: &[String]) {
        let mut subscriptions = self.subscriptions.write();
        for group in groups {
            let subscribers = subscriptions.entry(group.clone()).or_default();
            if !subscribers.iter().any(|s| s == subscriber_key) {
                subscribers.push(subscriber_key.to_string());
            }
        }
    }

    /// Retract a subscriber from each of the given service groups
    pub fn remove_subscriptions(&self, subscriber_key: &str, groups: &[String]) {
        let mut subscriptions = self.subscriptions.write();
        for group in groups {
            if let Some(subscribers) = subscriptions.get_mut(group) {
                subscribers.retain(|s| s != subscriber_key);
                if subscribers.is_empty() {
                    subscriptions.remove(group);
                }
            }
        }
    }

    /// Snapshot of the subscriber keys for a service group
    pub fn get_subscribers(&self, service_group: &str) -> Vec<String> {
        self.subscriptions
            .read()
            .get(service_group)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the entire cache contents.
    ///
    /// `subscriptions_by_subscriber` is keyed by subscriber (the shape the
    /// database hands back); it is inverted into the group index here.
    pub fn replace_all(
        &self,
        services: Vec<ServiceInfo>,
        subscriptions_by_subscriber: HashMap<String, Vec<String>>,
    ) {
        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for (subscriber, groups) in subscriptions_by_subscriber {
            for group in groups {
                let subscribers = index.entry(group).or_default();
                if !subscribers.iter().any(|s| s == &subscriber) {
                    subscribers.push(subscriber.clone());
                }
            }
        }

        let mut service_map = HashMap::with_capacity(services.len());
        for service in services {
            service_map.insert(service.key(), service);
        }

        *self.services.write() = service_map;
        *self.subscriptions.write() = index;
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
