use crate::server::{routes, static_files};
use axum::{
    routing::{get, post},
    Router,
};
use misinfo_classifier::Classifier;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Classifier answering predict requests
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

/// Build the Axum application
pub fn build_app(classifier: Arc<dyn Classifier>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/predict", post(routes::predict));

    Router::new()
        .nest("/api", api_routes)
        .fallback(static_files::serve_static)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(classifier))
}

/// Run the server until the process is stopped
pub async fn run_server(classifier: Arc<dyn Classifier>, addr: SocketAddr) -> anyhow::Result<()> {
    let name = classifier.name().to_string();
    let app = build_app(classifier);

    tracing::info!("Serving classifier '{}' on {}", name, addr);
    tracing::info!("Open http://{} in your browser", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
