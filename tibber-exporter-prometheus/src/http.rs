//! HTTP server for the scrape endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::FetchErrorPolicy;
use crate::scraper::Scraper;

const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    scraper: Scraper,
    on_fetch_error: FetchErrorPolicy,
}

/// Create the HTTP router.
fn create_router(
    scraper: Scraper,
    on_fetch_error: FetchErrorPolicy,
    request_logging: bool,
) -> Router {
    let state = AppState {
        scraper,
        on_fetch_error,
    };

    let router = Router::new()
        .route("/health", get(health_handler))
        .fallback(get(scrape_handler))
        .with_state(state);

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Handler for every path but `/health`: scrape upstream, then expose every instrument.
async fn scrape_handler(State(state): State<AppState>) -> Response {
    // Detached so a disconnecting client does not abort the upstream call.
    let scraper = state.scraper.clone();
    let result = tokio::spawn(async move { scraper.scrape().await }).await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "Scrape failed");
            match state.on_fetch_error {
                FetchErrorPolicy::Exit => std::process::exit(1),
                FetchErrorPolicy::Respond => {
                    return (StatusCode::BAD_GATEWAY, format!("scrape failed: {}\n", e))
                        .into_response();
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Scrape task failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "scrape task failed\n").into_response();
        }
    }

    match state.scraper.metrics().render() {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    scraper: Scraper,
    listen_addr: SocketAddr,
    on_fetch_error: FetchErrorPolicy,
    request_logging: bool,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        scraper: Scraper,
        listen_addr: SocketAddr,
        on_fetch_error: FetchErrorPolicy,
        request_logging: bool,
    ) -> Self {
        Self {
            scraper,
            listen_addr,
            on_fetch_error,
            request_logging,
        }
    }

    /// Build the router without binding a socket.
    pub fn router(&self) -> Router {
        create_router(
            self.scraper.clone(),
            self.on_fetch_error,
            self.request_logging,
        )
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = self.router();

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(addr = %self.listen_addr, "Server is listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
