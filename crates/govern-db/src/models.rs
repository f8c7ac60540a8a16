//! Domain models shared across the daemon

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol exposed by a provider endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
    Pfcp,
    Gtp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
            Protocol::Pfcp => "pfcp",
            Protocol::Gtp => "gtp",
            Protocol::Udp => "udp",
        }
    }
}

/// Health state of a registered pod
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(ServiceStatus::Healthy),
            "unhealthy" => Some(ServiceStatus::Unhealthy),
            "unknown" => Some(ServiceStatus::Unknown),
            _ => None,
        }
    }
}

/// Cause of an outbound membership notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Register,
    Unregister,
    Update,
    Reconcile,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Register => "register",
            EventType::Unregister => "unregister",
            EventType::Update => "update",
            EventType::Reconcile => "reconcile",
        }
    }
}

/// Transport endpoint exposed by a pod. Immutable within a registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderInfo {
    pub protocol: Protocol,
    pub ip: String,
    pub port: u16,
}

/// Registration request body as submitted by a pod
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    pub service_name: String,
    pub pod_name: String,
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
    #[serde(rename = "healthCheckURL")]
    pub health_check_url: String,
    #[serde(rename = "notificationURL")]
    pub notification_url: String,
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

/// A registered pod: the registration payload plus dynamic state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub service_name: String,
    pub pod_name: String,
    pub providers: Vec<ProviderInfo>,
    #[serde(rename = "healthCheckURL")]
    pub health_check_url: String,
    #[serde(rename = "notificationURL")]
    pub notification_url: String,
    pub subscriptions: Vec<String>,
    pub status: ServiceStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl ServiceInfo {
    /// Composite registry key, `serviceName:podName`
    pub fn key(&self) -> String {
        service_key(&self.service_name, &self.pod_name)
    }
}

/// Build the composite registry key for a `(serviceName, podName)` pair
pub fn service_key(service_name: &str, pod_name: &str) -> String {
    format!("{}:{}", service_name, pod_name)
}

/// Per-pod slice of a notification payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodInfo {
    pub pod_name: String,
    pub status: ServiceStatus,
    pub providers: Vec<ProviderInfo>,
}

/// Consolidated membership notification pushed to subscribers.
/// Describes the whole group at notification time, not a delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub service_name: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub pods: Vec<PodInfo>,
}
