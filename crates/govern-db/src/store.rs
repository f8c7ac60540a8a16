//! Persistence interface consumed by the coordination kernel

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{ServiceInfo, ServiceStatus};

/// Persistent mirror of the in-memory registry.
///
/// The cache handles all runtime queries; implementations of this trait only
/// have to support write-through on mutations and the bulk reads used during
/// reconcile resync. Callers bound every operation with their own deadline.
#[async_trait]
pub trait DatabaseStore: Send + Sync {
    /// Store or replace a service entry
    async fn save_service(&self, service: &ServiceInfo) -> Result<(), DbError>;

    /// Fetch a single service by its composite key (`serviceName:podName`)
    async fn get_service(&self, key: &str) -> Result<Option<ServiceInfo>, DbError>;

    /// Fetch every registered service. Used during reconcile resync.
    async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, DbError>;

    /// Remove a service entry by its composite key
    async fn delete_service(&self, key: &str) -> Result<(), DbError>;

    /// Update the health status and last-check timestamp of a service
    async fn update_health_status(
        &self,
        key: &str,
        status: ServiceStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Replace all subscriptions held by a subscriber
    async fn save_subscriptions(
        &self,
        subscriber_key: &str,
        groups: &[String],
    ) -> Result<(), DbError>;

    /// Fetch the service groups a subscriber is subscribed to
    async fn get_subscriptions(&self, subscriber_key: &str) -> Result<Vec<String>, DbError>;

    /// Fetch every subscription relationship, keyed by subscriber.
    /// Used during reconcile resync.
    async fn get_all_subscriptions(&self) -> Result<HashMap<String, Vec<String>>, DbError>;

    /// Remove all subscriptions held by a subscriber
    async fn delete_subscriptions(&self, subscriber_key: &str) -> Result<(), DbError>;

    /// Check that the backend is reachable
    async fn ping(&self) -> Result<(), DbError>;

    /// Release the connection and clean up resources
    async fn close(&self);
}
