use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use crate::error::{ClickError, Result};
use crate::health::HealthChecker;
use crate::middleware::ClientIdentity;
use crate::response::{ClickAcceptedResponse, ClickTotalsResponse, RateLimitStatusResponse};
use crate::service::ClickService;

/// Application state shared by handlers and middleware. Every field is a
/// cheap handle; no request-path state lives in the process.
#[derive(Clone)]
pub struct AppState {
    pub service: ClickService,
    pub health: HealthChecker,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(service: ClickService, trust_proxy_headers: bool) -> Self {
        let health = HealthChecker::new(service.store().clone());
        Self {
            service,
            health,
            trust_proxy_headers,
        }
    }
}

/// POST /api/click, behind the rate limiter.
pub async fn post_click(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let receipt = state
        .service
        .record_click()
        .await
        .map_err(ClickError::store("Failed to process click"))?;

    tracing::debug!(queued = receipt.queued, "Click queued");
    Ok(Json(ClickAcceptedResponse::from(receipt)))
}

/// GET /api/clicks
pub async fn get_clicks(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let totals = state
        .service
        .totals()
        .await
        .map_err(ClickError::store("Failed to get click count"))?;

    Ok(Json(ClickTotalsResponse::from(totals)))
}

/// GET /api/rate-limit-status
pub async fn get_rate_limit_status(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
) -> Result<impl IntoResponse> {
    let status = state
        .service
        .rate_status(identity.as_str())
        .await
        .map_err(ClickError::store("Failed to get rate limit status"))?;

    Ok(Json(RateLimitStatusResponse::new(status, identity.0)))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.check_health().await)
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.health.check_store().await;

    if store.is_healthy() {
        (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "store": "connected"
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "store": "disconnected",
                "error": store.error
            })),
        )
    }
}
