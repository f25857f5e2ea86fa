//! Intermediary for proxied-mode clients: keeps the provider credential on
//! the server and exposes `POST /api/generate`.

pub mod handlers;

use axum::routing::post;
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use textai_client::config::GENERATE_PATH;
use tower_http::trace::TraceLayer;

pub use handlers::{do_generate, ApiError, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            GENERATE_PATH,
            post(handlers::generate).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
