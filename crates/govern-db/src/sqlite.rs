//! SQLite-backed persistence via sqlx

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::DbError;
use crate::models::{ProviderInfo, ServiceInfo, ServiceStatus};
use crate::store::DatabaseStore;

/// SQLite implementation of [`DatabaseStore`].
///
/// Providers and subscription lists are embedded as JSON text columns;
/// timestamps are RFC3339 text.
#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Connect and run migrations
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let pool = SqlitePool::connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Get the underlying pool for advanced usage
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<(), DbError> {
        info!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                key TEXT PRIMARY KEY,
                service_name TEXT NOT NULL,
                pod_name TEXT NOT NULL,
                providers TEXT NOT NULL,
                health_check_url TEXT NOT NULL,
                notification_url TEXT NOT NULL,
                subscriptions TEXT NOT NULL,
                status TEXT NOT NULL,
                last_health_check TEXT,
                registered_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_services_service_name ON services(service_name)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_services_status ON services(status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                subscriber_key TEXT NOT NULL,
                service_group TEXT NOT NULL,
                UNIQUE(subscriber_key, service_group)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_subscriptions_service_group ON subscriptions(service_group)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations completed");
        Ok(())
    }
}

/// Parse a datetime string (RFC3339 format) or return current time
fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn service_from_row(row: &SqliteRow) -> Result<ServiceInfo, DbError> {
    let providers_json: String = row.get("providers");
    let subscriptions_json: String = row.get("subscriptions");
    let status: String = row.get("status");
    let last_health_check: Option<String> = row.get("last_health_check");
    let registered_at: String = row.get("registered_at");

    let providers: Vec<ProviderInfo> = serde_json::from_str(&providers_json)?;
    let subscriptions: Vec<String> = serde_json::from_str(&subscriptions_json)?;

    Ok(ServiceInfo {
        service_name: row.get("service_name"),
        pod_name: row.get("pod_name"),
        providers,
        health_check_url: row.get("health_check_url"),
        notification_url: row.get("notification_url"),
        subscriptions,
        status: ServiceStatus::from_str(&status).unwrap_or_default(),
        last_health_check: last_health_check
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        registered_at: parse_datetime_or_now(&registered_at),
    })
}

#[async_trait]
impl DatabaseStore for SqliteDatabase {
    async fn save_service(&self, service: &ServiceInfo) -> Result<(), DbError> {
        let providers = serde_json::to_string(&service.providers)?;
        let subscriptions = serde_json::to_string(&service.subscriptions)?;

        sqlx::query(
            r#"
            INSERT INTO services (key, service_name, pod_name, providers, health_check_url,
                                  notification_url, subscriptions, status, last_health_check,
                                  registered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                providers = excluded.providers,
                health_check_url = excluded.health_check_url,
                notification_url = excluded.notification_url,
                subscriptions = excluded.subscriptions,
                status = excluded.status,
                last_health_check = excluded.last_health_check,
                registered_at = excluded.registered_at
            "#,
        )
        .bind(service.key())
        .bind(&service.service_name)
        .bind(&service.pod_name)
        .bind(providers)
        .bind(&service.health_check_url)
        .bind(&service.notification_url)
        .bind(subscriptions)
        .bind(service.status.as_str())
        .bind(service.last_health_check.map(|t| t.to_rfc3339()))
        .bind(service.registered_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_service(&self, key: &str) -> Result<Option<ServiceInfo>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT service_name, pod_name, providers, health_check_url, notification_url,
                   subscriptions, status, last_health_check, registered_at
            FROM services
            WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| service_from_row(&row)).transpose()
    }

    async fn get_all_services(&self) -> Result<Vec<ServiceInfo>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT service_name, pod_name, providers, health_check_url, notification_url,
                   subscriptions, status, last_health_check, registered_at
            FROM services
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(service_from_row).collect()
    }

    async fn delete_service(&self, key: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM services WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_health_status(
        &self,
        key: &str,
        status: ServiceStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE services
            SET status = ?, last_health_check = ?
            WHERE key = ?
            "#,
        )
        .bind(status.as_str())
        .bind(timestamp.to_rfc3339())
        .bind(key)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn save_subscriptions(
        &self,
        subscriber_key: &str,
        groups: &[String],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM subscriptions WHERE subscriber_key = ?")
            .bind(subscriber_key)
            .execute(&mut *tx)
            .await?;

        for group in groups {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO subscriptions (subscriber_key, service_group)
                VALUES (?, ?)
                "#,
            )
            .bind(subscriber_key)
            .bind(group)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_subscriptions(&self, subscriber_key: &str) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT service_group FROM subscriptions WHERE subscriber_key = ?
            "#,
        )
        .bind(subscriber_key)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("service_group")).collect())
    }

    async fn get_all_subscriptions(&self) -> Result<HashMap<String, Vec<String>>, DbError> {
        let rows = sqlx::query("SELECT subscriber_key, service_group FROM subscriptions")
            .fetch_all(&self.pool)
            .await?;

        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for row in &rows {
            let subscriber: String = row.get("subscriber_key");
            let group: String = row.get("service_group");
            result.entry(subscriber).or_default().push(group);
        }
        Ok(result)
    }

    async fn delete_subscriptions(&self, subscriber_key: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_key = ?")
            .bind(subscriber_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
