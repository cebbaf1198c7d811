//! # HTTP Server for Model Generation
//!
//! Serves the upload page and the `/generate` endpoint it posts to.
//!
//! ## Usage
//!
//! ```bash
//! hueforge serve --listen 0.0.0.0:8000
//! ```
//!
//! Then open http://localhost:8000 in a browser, pick an image and press
//! *Generate*.
//!
//! ## Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | Upload page |
//! | GET | `/static/*path` | Page assets |
//! | POST | `/generate` | Multipart upload → `application/sla` download |

mod handlers;
mod state;
mod static_files;

pub use handlers::generate::GenerateForm;
pub use state::{AppState, DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::HueforgeError;

/// Build the application router.
pub fn router(config: ServerConfig) -> Router {
    let max_upload = config.max_upload_bytes;
    let app_state = Arc::new(AppState::new(config));

    Router::new()
        .route("/", get(static_files::index_handler))
        .route("/static/*path", get(static_files::asset_handler))
        .route(
            "/generate",
            post(handlers::generate::generate).layer(DefaultBodyLimit::max(max_upload)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use hueforge::server::{serve, ServerConfig};
///
/// # async fn example() -> Result<(), hueforge::error::HueforgeError> {
/// let config = ServerConfig {
///     listen_addr: "0.0.0.0:8000".to_string(),
///     ..Default::default()
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), HueforgeError> {
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            HueforgeError::Server(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    info!(
        listen = %config.listen_addr,
        max_upload_bytes = config.max_upload_bytes,
        "HueForge HTTP server starting"
    );
    info!("Open http://{}/ in your browser", config.listen_addr);

    serve_on(listener, config).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
) -> Result<(), HueforgeError> {
    axum::serve(listener, router(config))
        .await
        .map_err(|e| HueforgeError::Server(format!("Server error: {}", e)))
}
