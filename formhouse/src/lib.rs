//! # FormHouse
//!
//! A document-collection service for government-service applications. Users
//! pick a service (PAN card, Aadhar, scholarships, certificates, ...), fill
//! in contact details, and upload the required documents; FormHouse stores
//! the files and a metadata record through a configurable storage backend.
//!
//! ## Architecture
//!
//! - **[`catalog`]**: Static service catalog (documents required per service)
//! - **[`api`]**: Axum HTTP handlers and request/response models
//! - **[`storage`]**: The [`storage::StorageAdapter`] trait and its four
//!   backends: local disk, Google Drive, Firebase Storage, Cloudinary
//! - **[`config`]**: YAML + environment configuration via figment
//! - **[`errors`]**: Error taxonomy with HTTP status mapping
//!
//! The Drive backend is the interesting one: every destination folder is
//! verified to be a writable descendant of a shared root folder before any
//! file is placed, because service accounts silently fall back to their own
//! quota-less private storage when sharing is misconfigured.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use formhouse::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let app = Application::new(config)?;
//!     app.serve(std::future::pending()).await
//! }
//! ```

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub mod api;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod static_assets;
pub mod storage;
pub mod telemetry;

pub use config::Config;
use openapi::ApiDoc;
use storage::StorageAdapter;

/// Shared state available to all request handlers.
#[derive(Clone, bon::Builder)]
pub struct AppState {
    pub config: Config,
    /// Active storage backend; `None` means submissions are rejected with
    /// 503 until an operator configures one.
    pub storage: Option<Arc<dyn StorageAdapter>>,
}

/// Build the application router: API routes, interactive docs, and the
/// embedded frontend as fallback.
pub fn build_router(state: &AppState) -> Router {
    let max_request_size = state.config.max_request_size as usize;

    let api_routes = Router::new()
        .route("/health", get(api::handlers::system::health))
        .route("/services", get(api::handlers::system::list_services))
        .route(
            "/submit",
            post(api::handlers::submissions::submit).layer(DefaultBodyLimit::max(max_request_size)),
        )
        .route("/files", get(api::handlers::storage::list_files))
        .route("/test-folder", get(api::handlers::storage::test_folder))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .fallback(get(api::handlers::static_assets::serve_embedded_asset))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The assembled application, ready to serve.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] builds the storage adapter from
///    configuration and assembles the router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let storage = storage::create_adapter(&config.storage)?;
        let state = AppState::builder().config(config.clone()).maybe_storage(storage).build();
        let router = build_router(&state);
        Ok(Self { router, config })
    }

    /// Start serving until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "FormHouse listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalStorageConfig, StorageConfig};
    use crate::storage::local::LocalStorage;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use std::path::Path;

    fn local_state(root: &Path, max_file_size: u64) -> AppState {
        let storage_config = LocalStorageConfig {
            root: root.to_path_buf(),
            max_file_size,
        };
        let config = Config {
            storage: StorageConfig::Local(storage_config.clone()),
            ..Config::default()
        };
        let adapter = LocalStorage::new(storage_config).unwrap();
        AppState::builder()
            .config(config)
            .storage(Arc::new(adapter) as Arc<dyn StorageAdapter>)
            .build()
    }

    fn server(state: &AppState) -> TestServer {
        TestServer::new(build_router(state)).unwrap()
    }

    fn submission_form(service: &str, name: &str, file_bytes: usize) -> MultipartForm {
        MultipartForm::new()
            .add_text("service", service)
            .add_text("name", name)
            .add_text("phone", "9876543210")
            .add_text("email", "applicant@example.com")
            .add_part(
                "files",
                Part::bytes(vec![0u8; file_bytes])
                    .file_name("id.pdf")
                    .mime_type("application/pdf"),
            )
    }

    #[tokio::test]
    async fn submission_stores_files_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let response = server.post("/api/submit").multipart(submission_form("pan", "A B", 2048)).await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["service"], "PAN Card");
        assert_eq!(body["data"]["filesUploaded"], 1);
        assert_eq!(body["data"]["files"][0]["originalName"], "id.pdf");
        assert_eq!(body["data"]["files"][0]["size"], 2048);

        let user_dir = dir.path().join("pan/A_B");
        let entries: Vec<String> = std::fs::read_dir(&user_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(entries.iter().any(|n| n.starts_with("id_") && n.ends_with(".pdf")));
        assert!(entries.iter().any(|n| n.starts_with("metadata_") && n.ends_with(".json")));
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let form = MultipartForm::new()
            .add_text("service", "pan")
            .add_text("phone", "9876543210")
            .add_text("email", "applicant@example.com")
            .add_part("files", Part::bytes(vec![0u8; 64]).file_name("id.pdf"));
        let response = server.post("/api/submit").multipart(form).await;

        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("name"));
        // nothing may have been stored
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn empty_file_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let form = MultipartForm::new()
            .add_text("service", "pan")
            .add_text("name", "A B")
            .add_text("phone", "9876543210")
            .add_text("email", "applicant@example.com");
        let response = server.post("/api/submit").multipart(form).await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_as_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 1024);
        let server = server(&state);

        let response = server.post("/api/submit").multipart(submission_form("pan", "A B", 4096)).await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "file_too_large");
        assert!(body["message"].as_str().unwrap().contains("id.pdf"));
        // nothing may have been stored
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn unconfigured_storage_yields_503() {
        let state = AppState::builder().config(Config::default()).build();
        let server = server(&state);

        let response = server.post("/api/submit").multipart(submission_form("pan", "A B", 64)).await;
        response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "storage_unavailable");
    }

    #[tokio::test]
    async fn unknown_service_keys_are_stored_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let response = server
            .post("/api/submit")
            .multipart(submission_form("passport", "A B", 64))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        // no catalog entry, so the key itself is the display name
        assert_eq!(body["data"]["service"], "passport");
        assert!(dir.path().join("passport/A_B").is_dir());
    }

    #[tokio::test]
    async fn health_reports_the_active_provider() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let response = server.get("/api/health").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["storage"], "local");
    }

    #[tokio::test]
    async fn files_endpoint_lists_submissions() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        server
            .post("/api/submit")
            .multipart(submission_form("aadhar", "Priya", 128))
            .await
            .assert_status_ok();

        let response = server.get("/api/files").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let users = body["files"]["services"]["aadhar"].as_array().unwrap();
        assert_eq!(users[0]["user"], "Priya");
        assert_eq!(users[0]["files"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_folder_endpoint_is_unsupported_on_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let state = local_state(dir.path(), 10 * 1024 * 1024);
        let server = server(&state);

        let response = server.get("/api/test-folder").await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        // a capability mismatch, not an invalid request
        assert_eq!(body["error"], "unsupported_operation");
        assert!(body["message"].as_str().unwrap().contains("local"));
    }
}
