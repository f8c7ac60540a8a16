//! Registration, unregistration, and service listing routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use govern_core::Event;
use govern_db::{ServiceInfo, ServiceRegistration, ServiceStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnregisterRequest {
    service_name: String,
    pod_name: String,
}

/// POST /register
///
/// Validates the body, enqueues a `register` event, and echoes the
/// `ServiceInfo` the pipeline will store. The actual registration happens
/// asynchronously on the event worker.
async fn register(
    State(state): State<AppState>,
    payload: Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<Json<ServiceInfo>, ApiError> {
    let Json(registration) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if registration.service_name.is_empty() || registration.pod_name.is_empty() {
        return Err(ApiError::BadRequest(
            "serviceName and podName must be non-empty".to_string(),
        ));
    }

    let echo = ServiceInfo {
        service_name: registration.service_name.clone(),
        pod_name: registration.pod_name.clone(),
        providers: registration.providers.clone(),
        health_check_url: registration.health_check_url.clone(),
        notification_url: registration.notification_url.clone(),
        subscriptions: registration.subscriptions.clone(),
        status: ServiceStatus::Unknown,
        last_health_check: None,
        registered_at: Utc::now(),
    };

    info!("Registration request for {}", echo.key());
    state
        .queue
        .enqueue_timeout(Event::Register(registration), state.enqueue_timeout)
        .await?;

    Ok(Json(echo))
}

/// POST /unregister
///
/// Unregistering an unknown key is a no-op and still answers 200.
async fn unregister(
    State(state): State<AppState>,
    payload: Result<Json<UnregisterRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if request.service_name.is_empty() || request.pod_name.is_empty() {
        return Err(ApiError::BadRequest(
            "serviceName and podName must be non-empty".to_string(),
        ));
    }

    debug!(
        "Unregistration request for {}:{}",
        request.service_name, request.pod_name
    );
    state
        .queue
        .enqueue_timeout(
            Event::Unregister {
                service_name: request.service_name,
                pod_name: request.pod_name,
            },
            state.enqueue_timeout,
        )
        .await?;

    Ok(Json(json!({ "status": "ok" })))
}

/// GET /services — snapshot list of all registered services
async fn services(State(state): State<AppState>) -> Json<Vec<ServiceInfo>> {
    Json(state.registry.get_all_services())
}

/// Create governance routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/unregister", post(unregister))
        .route("/services", get(services))
}
