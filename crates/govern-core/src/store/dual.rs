//! Dual-layer store: in-memory cache plus optional persistent mirror

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use govern_db::{DatabaseStore, DbError, ServiceInfo, ServiceStatus};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::CoreError;
use crate::store::cache::CacheStore;

/// Composes the always-present cache with an optional database.
///
/// Every mutation writes the cache first and then mirrors to the database
/// under a bounded deadline. Mirror failures are logged and swallowed: the
/// cache is authoritative at runtime and the database catches up at the
/// next write or is re-read wholesale during reconcile.
pub struct DualStore {
    cache: CacheStore,
    database: Option<Arc<dyn DatabaseStore>>,
    op_timeout: Duration,
}

impl DualStore {
    pub fn new(database: Option<Arc<dyn DatabaseStore>>, op_timeout: Duration) -> Self {
        Self {
            cache: CacheStore::new(),
            database,
            op_timeout,
        }
    }

    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    async fn mirror<F>(&self, op: &'static str, fut: F)
    where
        F: Future<Output = Result<(), DbError>>,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Database mirror failed ({}): {}", op, e),
            Err(_) => warn!("Database mirror timed out ({})", op),
        }
    }

    // ==================== Mutations (event worker only) ====================

    pub async fn save_service(&self, service: &ServiceInfo) {
        self.cache.save_service(service.clone());
        if let Some(db) = &self.database {
            self.mirror("save_service", db.save_service(service)).await;
        }
    }

    pub async fn delete_service(&self, key: &str) -> Option<ServiceInfo> {
        let removed = self.cache.delete_service(key);
        if removed.is_some() {
            if let Some(db) = &self.database {
                self.mirror("delete_service", db.delete_service(key)).await;
            }
        }
        removed
    }

    /// Returns the previous status, or None if the key is unknown
    pub async fn update_health_status(
        &self,
        key: &str,
        status: ServiceStatus,
        timestamp: DateTime<Utc>,
    ) -> Option<ServiceStatus> {
        let previous = self.cache.update_health_status(key, status, timestamp)?;
        if let Some(db) = &self.database {
            self.mirror(
                "update_health_status",
                db.update_health_status(key, status, timestamp),
            )
            .await;
        }
        Some(previous)
    }

    pub async fn save_subscriptions(&self, subscriber_key: &str, groups: &[String]) {
        self.cache.add_subscriptions(subscriber_key, groups);
        if let Some(db) = &self.database {
            self.mirror(
                "save_subscriptions",
                db.save_subscriptions(subscriber_key, groups),
            )
            .await;
        }
    }

    pub async fn remove_subscriptions(&self, subscriber_key: &str, groups: &[String]) {
        self.cache.remove_subscriptions(subscriber_key, groups);
        if let Some(db) = &self.database {
            self.mirror(
                "delete_subscriptions",
                db.delete_subscriptions(subscriber_key),
            )
            .await;
        }
    }

    // ==================== Reads (cache only) ====================

    pub fn get_service(&self, key: &str) -> Option<ServiceInfo> {
        self.cache.get_service(key)
    }

    pub fn get_services_by_name(&self, service_name: &str) -> Vec<ServiceInfo> {
        self.cache.get_services_by_name(service_name)
    }

    pub fn get_all_services(&self) -> Vec<ServiceInfo> {
        self.cache.get_all_services()
    }

    pub fn service_keys(&self) -> Vec<String> {
        self.cache.service_keys()
    }

    pub fn get_subscribers(&self, service_group: &str) -> Vec<String> {
        self.cache.get_subscribers(service_group)
    }

    // ==================== Resync & lifecycle ====================

    /// Replace the cache with the database's view of the world.
    ///
    /// Only invoked from the reconcile handler, on the single worker, so no
    /// other mutation can interleave with the read-then-replace.
    pub async fn sync_from_database(&self) -> Result<(), CoreError> {
        let Some(db) = &self.database else {
            return Ok(());
        };

        let services = timeout(self.op_timeout, db.get_all_services())
            .await
            .map_err(|_| DbError::Timeout("get_all_services".to_string()))
            .map_err(CoreError::Persistence)??;
        let subscriptions = timeout(self.op_timeout, db.get_all_subscriptions())
            .await
            .map_err(|_| DbError::Timeout("get_all_subscriptions".to_string()))
            .map_err(CoreError::Persistence)??;

        let service_count = services.len();
        self.cache.replace_all(services, subscriptions);
        info!("Cache resynced from database ({} services)", service_count);
        Ok(())
    }

    /// Release database resources. Cache close is a no-op.
    pub async fn close(&self) {
        if let Some(db) = &self.database {
            db.close().await;
        }
    }
}
