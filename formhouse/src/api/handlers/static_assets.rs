//! HTTP handlers for static asset serving.

use axum::{
    body::Body,
    http::{Response, StatusCode, Uri},
    response::IntoResponse,
};

use crate::static_assets;

/// Serve the embedded frontend, defaulting to index.html.
pub async fn serve_embedded_asset(uri: Uri) -> impl IntoResponse {
    let mut path = uri.path().trim_start_matches('/');

    if path.is_empty() || path.ends_with('/') {
        path = "index.html";
    }

    if let Some(content) = static_assets::Assets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return Response::builder()
            .header(axum::http::header::CONTENT_TYPE, mime.as_ref())
            .header(axum::http::header::CACHE_CONTROL, "no-cache")
            .body(Body::from(content.data.into_owned()))
            .unwrap();
    }

    Response::builder().status(StatusCode::NOT_FOUND).body(Body::empty()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    fn create_test_router() -> Router {
        Router::new().fallback(get(serve_embedded_asset))
    }

    #[tokio::test]
    async fn root_serves_index_html() {
        let server = TestServer::new(create_test_router()).unwrap();
        let response = server.get("/").await;
        response.assert_status_ok();
        assert_eq!(
            response.headers().get("content-type").map(|v| v.to_str().unwrap()),
            Some("text/html")
        );
        let text = response.text();
        assert!(text.contains("<!DOCTYPE html>") || text.contains("<!doctype html>"));
    }

    #[tokio::test]
    async fn missing_assets_return_404() {
        let server = TestServer::new(create_test_router()).unwrap();
        let response = server.get("/no-such-file.js").await;
        response.assert_status(axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stylesheet_gets_css_content_type() {
        let server = TestServer::new(create_test_router()).unwrap();
        let response = server.get("/styles.css").await;
        response.assert_status_ok();
        assert_eq!(
            response.headers().get("content-type").map(|v| v.to_str().unwrap()),
            Some("text/css")
        );
    }
}
