//! Web server for the closures map.
//!
//! Every map request runs the whole pipeline: fetch from the closure
//! source, style, render, respond. Nothing is kept between requests apart
//! from the read-only style table inside the renderer.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::client::ClosureSource;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::render::{escape_html, MapRenderer};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Where closures come from.
    source: Arc<dyn ClosureSource>,
    /// Builds the page.
    renderer: MapRenderer,
    /// `max-age` for successful map pages.
    cache_max_age_secs: u64,
}

impl AppState {
    /// Create application state.
    #[must_use]
    pub fn new(
        source: Arc<dyn ClosureSource>,
        renderer: MapRenderer,
        cache_max_age_secs: u64,
    ) -> Self {
        Self {
            source,
            renderer,
            cache_max_age_secs,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let reason = status.canonical_reason().unwrap_or("Error");
        let body = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{code} {reason}</title></head>\n\
             <body>\n<h1>{code} {reason}</h1>\n<p>The road closures map could not be built.</p>\n\
             <p>{message}</p>\n</body>\n</html>\n",
            code = status.as_u16(),
            message = escape_html(&self.to_string()),
        );
        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Html(body),
        )
            .into_response()
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState, compression: bool) -> Router {
    let router = Router::new()
        .route("/", get(map_handler))
        .route("/map", get(map_handler))
        .route("/data", get(map_handler))
        .route("/contact", get(map_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if compression {
        router.layer(CompressionLayer::new())
    } else {
        router
    }
}

/// Start the web server and serve until interrupted.
///
/// # Errors
///
/// Returns an error if the style table is invalid or the address cannot be bound.
pub async fn run_server(config: &Config, source: Arc<dyn ClosureSource>) -> Result<()> {
    let styles = Arc::new(config.style_table()?);
    let renderer = MapRenderer::new(config.map.clone(), styles);
    let state = AppState::new(source, renderer, config.cache_max_age().as_secs());
    let app = create_router(state, config.server.compression);

    if !config.upstream.has_key() {
        warn!("No subscription key configured; map requests will fail until SUBSCRIPTION_KEY is set");
    }

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Road closures map at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn map_handler(State(state): State<AppState>) -> Result<Response> {
    let closures = state.source.fetch().await.inspect_err(|e| {
        error!(source = state.source.name(), error = %e, "Failed to fetch closures");
    })?;
    info!(closures = closures.len(), "Rendering closures map");

    let html = state.renderer.render(&closures)?;
    let cache_control = format!("public, max-age={}", state.cache_max_age_secs);
    Ok(([(header::CACHE_CONTROL, cache_control)], Html(html)).into_response())
}

async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
