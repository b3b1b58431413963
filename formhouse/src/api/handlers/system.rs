//! Health check and service catalog endpoints.

use axum::{Json, extract::State};

use crate::AppState;
use crate::api::models::system::{HealthResponse, ServiceSummary, ServicesResponse};
use crate::catalog;

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "system",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage = state
        .storage
        .as_ref()
        .map(|s| s.provider_name().to_string())
        .unwrap_or_else(|| "not configured".to_string());

    Json(HealthResponse {
        status: "ok".to_string(),
        message: "FormHouse API is running".to_string(),
        storage,
    })
}

#[utoipa::path(
    get,
    path = "/api/services",
    tag = "system",
    summary = "List available services",
    responses(
        (status = 200, description = "Service catalog", body = ServicesResponse)
    )
)]
pub async fn list_services() -> Json<ServicesResponse> {
    let services = catalog::SERVICES
        .iter()
        .map(|s| ServiceSummary {
            key: s.key.to_string(),
            name: s.name.to_string(),
        })
        .collect();
    Json(ServicesResponse { services })
}
