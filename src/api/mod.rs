//! HTTP server for the browser view

pub mod health;
pub mod turns;

use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::controller::ConversationController;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<ConversationController>,
}

/// Build the full application router
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .nest("/api", turns::router(state))
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the app until interrupted
///
/// # Errors
///
/// Returns error if the listener cannot bind
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "web view listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("web view stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
    }
}

/// The single-page view: Speak/Stop controls, status line, transcript
#[allow(clippy::unused_async)]
async fn index() -> Html<&'static str> {
    Html(include_str!("../../web/index.html"))
}
