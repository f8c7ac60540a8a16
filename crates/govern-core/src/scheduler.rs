//! Periodic drivers that feed the event pipeline

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::queue::EventQueue;
use crate::registry::Registry;

/// Periodically enqueues one `healthcheck` event per registered pod.
///
/// Only reads a key snapshot; never touches registry state directly. The
/// per-tick burst is bounded by the current service count, and queue
/// backpressure governs overload.
pub struct HealthCheckScheduler {
    registry: Arc<Registry>,
    queue: Arc<EventQueue>,
    interval: Duration,
    cancel: CancellationToken,
}

impl HealthCheckScheduler {
    pub fn new(registry: Arc<Registry>, queue: Arc<EventQueue>, interval: Duration) -> Self {
        Self {
            registry,
            queue,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn run(&self) {
        info!(
            "Health check scheduler started (interval {:?})",
            self.interval
        );
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.schedule_health_checks().await,
                _ = self.cancel.cancelled() => {
                    info!("Health check scheduler stopped");
                    break;
                }
            }
        }
    }

    async fn schedule_health_checks(&self) {
        let keys = self.registry.service_keys();
        debug!("Scheduling health checks for {} services", keys.len());

        for service_key in keys {
            if let Err(e) = self
                .queue
                .enqueue(Event::HealthCheck { service_key })
                .await
            {
                warn!("Failed to enqueue health check event: {}", e);
                return;
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Periodically enqueues a single `reconcile` event
pub struct ReconcileScheduler {
    queue: Arc<EventQueue>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ReconcileScheduler {
    pub fn new(queue: Arc<EventQueue>, interval: Duration) -> Self {
        Self {
            queue,
            interval,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn run(&self) {
        info!("Reconcile scheduler started (interval {:?})", self.interval);
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Enqueuing reconcile event");
                    if let Err(e) = self.queue.enqueue(Event::Reconcile).await {
                        warn!("Failed to enqueue reconcile event: {}", e);
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("Reconcile scheduler stopped");
                    break;
                }
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::EventQueueConfig;
    use crate::store::DualStore;
    use govern_db::ServiceRegistration;
    use tokio::time::{sleep, timeout};

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        timeout(Duration::from_secs(5), async {
            while !cond() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_health_check_scheduler_enqueues_per_service() {
        let store = Arc::new(DualStore::new(None, Duration::from_secs(1)));
        let registry = Arc::new(Registry::new(store));
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 64 }));

        for pod in ["pod-1", "pod-2"] {
            registry
                .register(ServiceRegistration {
                    service_name: "user-svc".to_string(),
                    pod_name: pod.to_string(),
                    providers: vec![],
                    health_check_url: "http://127.0.0.1:1/h".to_string(),
                    notification_url: "http://127.0.0.1:1/n".to_string(),
                    subscriptions: vec![],
                })
                .await;
        }

        let scheduler = Arc::new(HealthCheckScheduler::new(
            registry,
            queue.clone(),
            Duration::from_millis(20),
        ));
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        // One tick enqueues one event per registered pod
        wait_for(|| queue.len() >= 2).await;

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_scheduler_enqueues_single_events() {
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 64 }));
        let scheduler = Arc::new(ReconcileScheduler::new(
            queue.clone(),
            Duration::from_millis(20),
        ));
        let handle = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        wait_for(|| queue.len() >= 2).await;

        scheduler.stop();
        handle.await.unwrap();

        // No more events after stop
        let len_after_stop = queue.len();
        sleep(Duration::from_millis(60)).await;
        assert_eq!(queue.len(), len_after_stop);
    }
}
