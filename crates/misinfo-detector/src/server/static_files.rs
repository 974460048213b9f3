use axum::{
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Json,
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "web"]
struct WebAssets;

const INDEX_PAGE: &str = "index.html";

/// Fallback for every route the router does not know.
///
/// Unknown `/api` paths get a JSON 404 so API clients never receive the
/// page; embedded assets are served by path; anything else gets the page.
pub async fn serve_static(uri: Uri) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no API route {}", path) })),
        )
            .into_response();
    }

    let asset = match path.trim_start_matches('/') {
        "" => INDEX_PAGE,
        other => other,
    };
    if let Some(content) = WebAssets::get(asset) {
        let mime = mime_guess::from_path(asset).first_or_octet_stream();
        return ([(header::CONTENT_TYPE, mime.to_string())], content.data.into_owned()).into_response();
    }

    match WebAssets::get(INDEX_PAGE) {
        Some(page) => Html(page.data.into_owned()).into_response(),
        None => (StatusCode::NOT_FOUND, "page not embedded").into_response(),
    }
}
