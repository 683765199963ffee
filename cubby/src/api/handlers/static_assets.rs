//! HTTP handlers for static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use tracing::instrument;

use crate::static_assets;

/// Serve embedded static assets
#[utoipa::path(
    get,
    path = "/static/{path}",
    tag = "pages",
    params(("path" = String, Path, description = "Asset path relative to the static root")),
    responses(
        (status = 200, description = "Asset contents"),
        (status = 404, description = "No such asset")
    )
)]
#[instrument]
pub async fn serve_static_asset(Path(path): Path<String>) -> impl IntoResponse {
    let Some(content) = static_assets::Assets::get(&path) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap();
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();

    Response::builder()
        .header(axum::http::header::CONTENT_TYPE, mime.as_ref())
        .header(axum::http::header::CACHE_CONTROL, "no-cache")
        .body(Body::from(content.data.into_owned()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use axum_test::TestServer;

    fn create_test_router() -> Router {
        Router::new().route("/static/{*path}", get(serve_static_asset))
    }

    #[tokio::test]
    async fn test_serve_stylesheet() {
        let app = create_test_router();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/static/style.css").await;

        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").map(|v| v.to_str().unwrap()),
            Some("text/css")
        );
        assert_eq!(
            response.headers().get("cache-control").map(|v| v.to_str().unwrap()),
            Some("no-cache")
        );
        assert!(response.text().contains(".card"));
    }

    #[tokio::test]
    async fn test_unknown_asset_is_404() {
        let app = create_test_router();
        let server = TestServer::new(app).unwrap();

        let response = server.get("/static/missing.js").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
