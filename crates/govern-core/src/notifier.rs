//! Fire-and-forget subscriber notifications

use std::time::Duration;

use chrono::Utc;
use govern_db::{EventType, NotificationPayload, PodInfo, ServiceInfo};
use reqwest::Client;
use tracing::{debug, warn};

/// Posts JSON membership payloads to subscriber notification URLs.
///
/// Delivery is best-effort: each notification runs on its own background
/// task, failures are logged and dropped, and there is no retry. Lost
/// notifications are repaired by the periodic reconcile broadcast.
pub struct Notifier {
    client: Client,
    timeout: Duration,
}

impl Notifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    /// Dispatch the payload to every subscriber. Returns without waiting for
    /// any delivery to complete.
    pub fn notify_subscribers(&self, subscribers: &[ServiceInfo], payload: &NotificationPayload) {
        debug!(
            "Notifying {} subscribers of {} ({})",
            subscribers.len(),
            payload.service_name,
            payload.event_type.as_str()
        );

        for subscriber in subscribers {
            let client = self.client.clone();
            let url = subscriber.notification_url.clone();
            let subscriber_key = subscriber.key();
            let payload = payload.clone();
            let timeout = self.timeout;

            tokio::spawn(async move {
                send_notification(client, url, payload, subscriber_key, timeout).await;
            });
        }
    }
}

async fn send_notification(
    client: Client,
    url: String,
    payload: NotificationPayload,
    subscriber_key: String,
    timeout: Duration,
) {
    match client
        .post(&url)
        .timeout(timeout)
        .json(&payload)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            metrics::counter!("govern_notifications_total", "result" => "sent").increment(1);
            debug!(
                "Notification delivered to {} ({}, event {})",
                subscriber_key,
                url,
                payload.event_type.as_str()
            );
        }
        Ok(response) => {
            metrics::counter!("govern_notifications_total", "result" => "rejected").increment(1);
            warn!(
                "Notification to {} ({}) returned status {}",
                subscriber_key,
                url,
                response.status()
            );
        }
        Err(e) => {
            metrics::counter!("govern_notifications_total", "result" => "failed").increment(1);
            warn!("Failed to notify {} ({}): {}", subscriber_key, url, e);
        }
    }
}

/// Build the full-group payload for a notification
pub fn build_notification_payload(
    service_name: &str,
    event_type: EventType,
    pods: &[ServiceInfo],
) -> NotificationPayload {
    NotificationPayload {
        service_name: service_name.to_string(),
        event_type,
        timestamp: Utc::now(),
        pods: pods
            .iter()
            .map(|pod| PodInfo {
                pod_name: pod.pod_name.clone(),
                status: pod.status,
                providers: pod.providers.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use govern_db::{Protocol, ProviderInfo, ServiceStatus};
    use parking_lot::Mutex;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::time::{sleep, timeout as tokio_timeout};

    type Received = Arc<Mutex<Vec<NotificationPayload>>>;

    async fn spawn_capture_server(received: Received, status: StatusCode) -> SocketAddr {
        let router = Router::new()
            .route(
                "/notify",
                post(
                    move |State(received): State<Received>, Json(payload): Json<NotificationPayload>| async move {
                        received.lock().push(payload);
                        status
                    },
                ),
            )
            .with_state(received);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn subscriber(addr: SocketAddr, pod_name: &str) -> ServiceInfo {
        ServiceInfo {
            service_name: "subscriber-svc".to_string(),
            pod_name: pod_name.to_string(),
            providers: vec![],
            health_check_url: String::new(),
            notification_url: format!("http://{}/notify", addr),
            subscriptions: vec!["watched-svc".to_string()],
            status: ServiceStatus::Unknown,
            last_health_check: None,
            registered_at: Utc::now(),
        }
    }

    fn pod(pod_name: &str, status: ServiceStatus) -> ServiceInfo {
        ServiceInfo {
            service_name: "watched-svc".to_string(),
            pod_name: pod_name.to_string(),
            providers: vec![ProviderInfo {
                protocol: Protocol::Http,
                ip: "10.0.0.1".to_string(),
                port: 8080,
            }],
            health_check_url: String::new(),
            notification_url: String::new(),
            subscriptions: vec![],
            status,
            last_health_check: None,
            registered_at: Utc::now(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        tokio_timeout(Duration::from_secs(5), async {
            while !cond() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_build_payload_describes_whole_group() {
        let pods = vec![
            pod("pod-1", ServiceStatus::Healthy),
            pod("pod-2", ServiceStatus::Unhealthy),
        ];
        let payload = build_notification_payload("watched-svc", EventType::Update, &pods);

        assert_eq!(payload.service_name, "watched-svc");
        assert_eq!(payload.event_type, EventType::Update);
        assert_eq!(payload.pods.len(), 2);
        assert_eq!(payload.pods[0].pod_name, "pod-1");
        assert_eq!(payload.pods[0].status, ServiceStatus::Healthy);
        assert_eq!(payload.pods[0].providers.len(), 1);
    }

    #[test]
    fn test_build_payload_empty_group() {
        let payload = build_notification_payload("watched-svc", EventType::Unregister, &[]);
        assert!(payload.pods.is_empty());
    }

    #[tokio::test]
    async fn test_notify_delivers_to_every_subscriber() {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_capture_server(received.clone(), StatusCode::OK).await;

        let notifier = Notifier::new(Duration::from_secs(1));
        let payload = build_notification_payload(
            "watched-svc",
            EventType::Register,
            &[pod("pod-1", ServiceStatus::Unknown)],
        );

        notifier.notify_subscribers(
            &[subscriber(addr, "pod-a"), subscriber(addr, "pod-b")],
            &payload,
        );

        wait_for(|| received.lock().len() == 2).await;
        let first = &received.lock()[0];
        assert_eq!(first.service_name, "watched-svc");
        assert_eq!(first.event_type, EventType::Register);
        assert_eq!(first.pods[0].pod_name, "pod-1");
    }

    #[tokio::test]
    async fn test_rejected_notification_is_not_retried() {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_capture_server(received.clone(), StatusCode::INTERNAL_SERVER_ERROR).await;

        let notifier = Notifier::new(Duration::from_secs(1));
        let payload = build_notification_payload("watched-svc", EventType::Register, &[]);
        notifier.notify_subscribers(&[subscriber(addr, "pod-a")], &payload);

        wait_for(|| received.lock().len() == 1).await;
        // Give a would-be retry time to show up
        sleep(Duration::from_millis(100)).await;
        assert_eq!(received.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_subscriber_is_dropped() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let notifier = Notifier::new(Duration::from_millis(200));
        let payload = build_notification_payload("watched-svc", EventType::Register, &[]);
        // Must not panic or block
        notifier.notify_subscribers(&[subscriber(addr, "pod-a")], &payload);
        sleep(Duration::from_millis(300)).await;
    }
}
