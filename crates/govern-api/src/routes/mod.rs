//! API routes

mod governance;
mod health;
pub mod metrics;

use axum::Router;
use std::sync::Arc;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(health::routes())
        .merge(governance::routes())
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use govern_core::{EventQueue, EventQueueConfig, Registry};
    use govern_db::ServiceInfo;
    use govern_core::store::DualStore;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(buffer_size: usize) -> (AppState, Arc<EventQueue>, Arc<Registry>) {
        let store = Arc::new(DualStore::new(None, Duration::from_secs(1)));
        let registry = Arc::new(Registry::new(store));
        let queue = Arc::new(EventQueue::new(EventQueueConfig { buffer_size }));
        let state = AppState::new(registry.clone(), queue.clone(), Duration::from_millis(50));
        (state, queue, registry)
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn registration_body() -> Value {
        json!({
            "serviceName": "user-svc",
            "podName": "pod-1",
            "providers": [{"protocol": "http", "ip": "10.0.0.1", "port": 8080}],
            "healthCheckURL": "http://10.0.0.1:8080/h",
            "notificationURL": "http://10.0.0.1:8080/n",
            "subscriptions": []
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_enqueues_and_echoes() {
        let (state, queue, _) = test_state(16);
        let router = create_router(state, None);

        let response = router
            .oneshot(json_request("/register", registration_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["serviceName"], "user-svc");
        assert_eq!(body["podName"], "pod-1");
        assert_eq!(body["status"], "unknown");
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_names() {
        let (state, queue, _) = test_state(16);
        let router = create_router(state, None);

        let mut body = registration_body();
        body["podName"] = json!("");
        let response = router.oneshot(json_request("/register", body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_malformed_body() {
        let (state, _, _) = test_state(16);
        let router = create_router(state, None);

        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_register_full_queue_is_overloaded() {
        let (state, queue, _) = test_state(1);
        let router = create_router(state, None);

        // Fill the single slot; no consumer is running
        queue.enqueue(govern_core::Event::Reconcile).await.unwrap();

        let response = router
            .oneshot(json_request("/register", registration_body()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "OVERLOADED");
    }

    #[tokio::test]
    async fn test_unregister_unknown_key_is_ok() {
        let (state, queue, _) = test_state(16);
        let router = create_router(state, None);

        let response = router
            .oneshot(json_request(
                "/unregister",
                json!({"serviceName": "ghost-svc", "podName": "pod-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_unregister_rejects_empty_names() {
        let (state, _, _) = test_state(16);
        let router = create_router(state, None);

        let response = router
            .oneshot(json_request(
                "/unregister",
                json!({"serviceName": "", "podName": "pod-1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_services_returns_snapshot() {
        let (state, _, registry) = test_state(16);
        let router = create_router(state, None);

        registry
            .register(govern_db::ServiceRegistration {
                service_name: "user-svc".to_string(),
                pod_name: "pod-1".to_string(),
                providers: vec![],
                health_check_url: "http://10.0.0.1:8080/h".to_string(),
                notification_url: "http://10.0.0.1:8080/n".to_string(),
                subscriptions: vec![],
            })
            .await;

        let response = router
            .oneshot(Request::builder().uri("/services").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let services: Vec<ServiceInfo> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service_name, "user-svc");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (state, _, _) = test_state(16);
        let router = create_router(state, None);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}
