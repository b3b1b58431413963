use serde::Serialize;
use utoipa::ToSchema;

/// Response for the health check endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    /// Active storage provider name, or "not configured"
    pub storage: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServicesResponse {
    pub services: Vec<ServiceSummary>,
}

/// One catalog entry as exposed to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceSummary {
    pub key: String,
    pub name: String,
}
