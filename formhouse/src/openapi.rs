//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "FormHouse API",
        description = "Document-collection service for government-service applications. \
                       Collects contact details and document files per service and stores \
                       them through a configurable storage backend.",
        version = env!("CARGO_PKG_VERSION"),
    ),
    paths(
        api::handlers::system::health,
        api::handlers::system::list_services,
        api::handlers::submissions::submit,
        api::handlers::storage::list_files,
        api::handlers::storage::test_folder,
    ),
    components(schemas(
        api::models::system::HealthResponse,
        api::models::system::ServicesResponse,
        api::models::system::ServiceSummary,
        api::models::submissions::SubmitResponse,
        api::models::submissions::SubmitData,
        api::models::storage::FilesResponse,
        api::models::storage::TestFolderResponse,
        crate::storage::UploadedFileRecord,
        crate::storage::StoredTree,
        crate::storage::StoredUser,
        crate::storage::StoredFile,
        crate::storage::RootDiagnostics,
    )),
    tags(
        (name = "system", description = "Health and service catalog"),
        (name = "submissions", description = "Document submission"),
        (name = "storage", description = "Storage inspection and diagnostics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_contains_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<_> = spec.paths.paths.keys().cloned().collect();
        for expected in ["/api/health", "/api/services", "/api/submit", "/api/files", "/api/test-folder"] {
            assert!(paths.iter().any(|p| p == expected), "missing {expected} in {paths:?}");
        }
    }
}
