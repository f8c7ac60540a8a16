//! Lifecycle orchestrator: wires the component graph and owns start/stop

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use govern_api::{create_router, AppState, MetricsHandle};
use govern_core::{
    EventQueue, EventQueueConfig, EventWorker, HealthCheckScheduler, HealthChecker, ManagerConfig,
    Notifier, ReconcileScheduler, Registry,
};
use govern_core::store::DualStore;
use govern_db::{DatabaseStore, ServiceInfo};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

struct RunningTasks {
    queue: JoinHandle<()>,
    health_scheduler: JoinHandle<()>,
    reconcile_scheduler: JoinHandle<()>,
    http: JoinHandle<()>,
}

/// Wires the component graph and owns its lifecycle.
///
/// `start` launches the queue consumer, both schedulers, and the HTTP
/// front end; `stop` tears them down in an order that guarantees no event
/// is enqueued after it returns.
pub struct Manager {
    config: ManagerConfig,
    store: Arc<DualStore>,
    registry: Arc<Registry>,
    queue: Arc<EventQueue>,
    health_check_scheduler: Arc<HealthCheckScheduler>,
    reconcile_scheduler: Arc<ReconcileScheduler>,
    metrics_handle: Option<Arc<MetricsHandle>>,
    http_shutdown: CancellationToken,
    tasks: Mutex<Option<RunningTasks>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Manager {
    /// Cache-only manager (no database persistence)
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_database(config, None)
    }

    /// Manager with an optional persistent mirror. The cache always serves
    /// runtime reads; the database is written through and re-read during
    /// reconcile.
    pub fn with_database(config: ManagerConfig, database: Option<Arc<dyn DatabaseStore>>) -> Self {
        let store = Arc::new(DualStore::new(database, config.database_op_timeout));
        let registry = Arc::new(Registry::new(store.clone()));
        let queue = Arc::new(EventQueue::new(EventQueueConfig {
            buffer_size: config.event_queue_size,
        }));

        let notifier = Arc::new(Notifier::new(config.notification_timeout));
        let health_checker = Arc::new(HealthChecker::new(
            config.health_check_timeout,
            config.health_check_retry,
        ));

        let worker = Arc::new(EventWorker::new(
            registry.clone(),
            notifier,
            health_checker,
            store.clone(),
        ));
        worker.register_handlers(&queue);

        let health_check_scheduler = Arc::new(HealthCheckScheduler::new(
            registry.clone(),
            queue.clone(),
            config.health_check_interval,
        ));
        let reconcile_scheduler = Arc::new(ReconcileScheduler::new(
            queue.clone(),
            config.notification_interval,
        ));

        Self {
            config,
            store,
            registry,
            queue,
            health_check_scheduler,
            reconcile_scheduler,
            metrics_handle: None,
            http_shutdown: CancellationToken::new(),
            tasks: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Expose a Prometheus handle at GET /metrics
    pub fn with_metrics_handle(mut self, handle: Arc<MetricsHandle>) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Launch the event pipeline, schedulers, and HTTP front end.
    ///
    /// The only fatal error is failing to bind the listening port; it is
    /// returned to the caller.
    pub async fn start(&self) -> std::io::Result<()> {
        info!("Starting governance manager");

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.server_port));
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock() = Some(local_addr);

        let queue_task = {
            let queue = self.queue.clone();
            tokio::spawn(async move {
                if let Err(e) = queue.run().await {
                    error!("Event queue error: {}", e);
                }
            })
        };

        let health_scheduler_task = {
            let scheduler = self.health_check_scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };
        let reconcile_scheduler_task = {
            let scheduler = self.reconcile_scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        let state = AppState::new(
            self.registry.clone(),
            self.queue.clone(),
            self.config.enqueue_timeout,
        );
        let router =
            create_router(state, self.metrics_handle.clone()).layer(TraceLayer::new_for_http());
        let shutdown = self.http_shutdown.clone();
        let http_task = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await });
            if let Err(e) = serve.await {
                error!("HTTP server error: {}", e);
            }
        });

        *self.tasks.lock() = Some(RunningTasks {
            queue: queue_task,
            health_scheduler: health_scheduler_task,
            reconcile_scheduler: reconcile_scheduler_task,
            http: http_task,
        });

        info!(
            "Governance manager started on {} (health check every {:?}, reconcile every {:?})",
            local_addr, self.config.health_check_interval, self.config.notification_interval
        );
        Ok(())
    }

    /// Graceful shutdown: schedulers first (no new periodic events), then
    /// the HTTP server under a bounded grace deadline, then the queue (the
    /// in-flight handler finishes), then the store.
    pub async fn stop(&self) {
        let Some(tasks) = self.tasks.lock().take() else {
            return;
        };
        info!("Stopping governance manager");

        self.health_check_scheduler.stop();
        self.reconcile_scheduler.stop();
        let _ = tasks.health_scheduler.await;
        let _ = tasks.reconcile_scheduler.await;

        self.http_shutdown.cancel();
        if timeout(Duration::from_secs(10), tasks.http).await.is_err() {
            warn!("HTTP server did not shut down within the grace period");
        }

        self.queue.stop();
        let _ = tasks.queue.await;

        self.store.close().await;
        info!("Governance manager stopped");
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Address the HTTP front end is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// All pods of a service group
    pub fn service_pods(&self, service_name: &str) -> Vec<ServiceInfo> {
        self.registry.get_by_service_name(service_name)
    }

    /// All registered pods grouped by service name
    pub fn all_service_pods(&self) -> HashMap<String, Vec<ServiceInfo>> {
        let mut result: HashMap<String, Vec<ServiceInfo>> = HashMap::new();
        for service in self.registry.get_all_services() {
            result
                .entry(service.service_name.clone())
                .or_default()
                .push(service);
        }
        result
    }
}
