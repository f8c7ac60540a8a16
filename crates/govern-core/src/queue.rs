//! Bounded FIFO event queue with a single sequential consumer

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::events::Event;

/// Processes one kind of event. Handlers run on the single consumer, so at
/// most one `handle` is in flight at any time across all kinds.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: Event) -> Result<(), CoreError>;
}

#[derive(Debug, Clone)]
pub struct EventQueueConfig {
    /// Capacity of the buffer between producers and the consumer
    pub buffer_size: usize,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Bounded FIFO dispatch pipeline.
///
/// Producers enqueue from any task; `run` consumes events strictly in
/// enqueue order and awaits each handler to completion before taking the
/// next event. A full buffer exerts backpressure on producers.
pub struct EventQueue {
    tx: mpsc::Sender<Event>,
    rx: Mutex<Option<mpsc::Receiver<Event>>>,
    handlers: RwLock<HashMap<&'static str, Arc<dyn EventHandler>>>,
    shutdown: CancellationToken,
}

impl EventQueue {
    pub fn new(config: EventQueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer_size.max(1));
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            handlers: RwLock::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register the handler for an event kind, replacing any previous one
    pub fn register_handler(&self, kind: &'static str, handler: Arc<dyn EventHandler>) {
        self.handlers.write().insert(kind, handler);
    }

    /// Enqueue an event, waiting for a free slot if the buffer is full
    pub async fn enqueue(&self, event: Event) -> Result<(), CoreError> {
        if self.shutdown.is_cancelled() {
            return Err(CoreError::QueueClosed);
        }
        self.tx.send(event).await.map_err(|_| CoreError::QueueClosed)
    }

    /// Enqueue an event, giving up with `Overloaded` once the deadline
    /// elapses without a free slot
    pub async fn enqueue_timeout(&self, event: Event, deadline: Duration) -> Result<(), CoreError> {
        if self.shutdown.is_cancelled() {
            return Err(CoreError::QueueClosed);
        }
        match self.tx.send_timeout(event, deadline).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(CoreError::Overloaded),
            Err(SendTimeoutError::Closed(_)) => Err(CoreError::QueueClosed),
        }
    }

    /// Number of events currently buffered
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume events until `stop` is called. Dequeues one event at a time
    /// and awaits its handler; the current handler always finishes before
    /// the loop observes the stop signal.
    pub async fn run(&self) -> Result<(), CoreError> {
        let Some(mut rx) = self.rx.lock().take() else {
            return Err(CoreError::Validation(
                "event queue consumer already started".to_string(),
            ));
        };

        info!("Event queue consumer started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => self.dispatch(event).await,
                        None => break,
                    }
                }
            }
        }
        info!("Event queue consumer stopped");
        Ok(())
    }

    async fn dispatch(&self, event: Event) {
        let kind = event.kind();
        let handler = self.handlers.read().get(kind).cloned();
        match handler {
            Some(handler) => {
                metrics::counter!("govern_events_processed_total", "kind" => kind).increment(1);
                if let Err(e) = handler.handle(event).await {
                    warn!("Event handler failed ({}): {}", kind, e);
                }
            }
            None => debug!("No handler registered for event kind: {}", kind),
        }
    }

    /// Stop accepting work. The consumer exits after the in-flight handler
    /// (if any) completes; buffered events are dropped.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};

    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Recording {
        async fn handle(&self, event: Event) -> Result<(), CoreError> {
            let label = match &event {
                Event::HealthCheck { service_key } => service_key.clone(),
                other => other.kind().to_string(),
            };
            self.seen.lock().push(label);
            if self.fail {
                Err(CoreError::NotFound("injected".to_string()))
            } else {
                Ok(())
            }
        }
    }

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
    async fn test_events_processed_in_enqueue_order() {
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 16 }));
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        queue.register_handler(crate::events::kinds::HEALTH_CHECK, handler.clone());

        for i in 0..5 {
            queue
                .enqueue(Event::HealthCheck {
                    service_key: format!("svc:pod-{}", i),
                })
                .await
                .unwrap();
        }

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run().await })
        };

        wait_for(|| handler.seen.lock().len() == 5).await;
        assert_eq!(
            *handler.seen.lock(),
            (0..5).map(|i| format!("svc:pod-{}", i)).collect::<Vec<_>>()
        );

        queue.stop();
        consumer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unknown_kind_is_skipped() {
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 16 }));
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        // Only reconcile has a handler
        queue.register_handler(crate::events::kinds::RECONCILE, handler.clone());

        queue
            .enqueue(Event::HealthCheck {
                service_key: "svc:pod-1".to_string(),
            })
            .await
            .unwrap();
        queue.enqueue(Event::Reconcile).await.unwrap();

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run().await })
        };

        wait_for(|| handler.seen.lock().len() == 1).await;
        assert_eq!(*handler.seen.lock(), vec!["reconcile".to_string()]);

        queue.stop();
        consumer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handler_error_does_not_halt_consumer() {
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 16 }));
        let handler = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        queue.register_handler(crate::events::kinds::HEALTH_CHECK, handler.clone());

        for i in 0..3 {
            queue
                .enqueue(Event::HealthCheck {
                    service_key: format!("svc:pod-{}", i),
                })
                .await
                .unwrap();
        }

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run().await })
        };

        wait_for(|| handler.seen.lock().len() == 3).await;

        queue.stop();
        consumer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_full_buffer_past_deadline_is_overloaded() {
        // Consumer never started: one slot, then backpressure
        let queue = EventQueue::new(EventQueueConfig { buffer_size: 1 });

        queue.enqueue(Event::Reconcile).await.unwrap();
        assert_eq!(queue.len(), 1);

        let err = queue
            .enqueue_timeout(Event::Reconcile, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Overloaded));
    }

    #[tokio::test]
    async fn test_enqueue_after_stop_fails() {
        let queue = EventQueue::new(EventQueueConfig { buffer_size: 16 });
        queue.stop();

        let err = queue.enqueue(Event::Reconcile).await.unwrap_err();
        assert!(matches!(err, CoreError::QueueClosed));

        let err = queue
            .enqueue_timeout(Event::Reconcile, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::QueueClosed));
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size: 1 }));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.run().await })
        };

        // Give the first consumer a chance to take the receiver
        sleep(Duration::from_millis(20)).await;
        assert!(queue.run().await.is_err());

        queue.stop();
        consumer.await.unwrap().unwrap();
    }
}
