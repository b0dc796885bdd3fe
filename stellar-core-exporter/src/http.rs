//! HTTP server exposing scrapes of the upstream node.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::collector::CONTENT_TYPE;
use crate::scrape::Scraper;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    scraper: Arc<Scraper>,
}

/// Create the HTTP router.
///
/// Every path is a scrape; there are no other routes.
fn create_router(scraper: Arc<Scraper>) -> Router {
    let state = AppState { scraper };

    Router::new()
        .fallback(scrape_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for any request: GET triggers a scrape.
async fn scrape_handler(method: Method, State(state): State<AppState>) -> Response {
    if method != Method::GET {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET")],
            "method not allowed\n",
        )
            .into_response();
    }

    match state.scraper.scrape().await {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, CONTENT_TYPE)],
            output.body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Scrape failed");
            (
                e.status_code(),
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("scrape failed: {}\n", e),
            )
                .into_response()
        }
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    scraper: Arc<Scraper>,
    listen_addr: SocketAddr,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(scraper: Arc<Scraper>, listen_addr: SocketAddr) -> Self {
        Self {
            scraper,
            listen_addr,
        }
    }

    /// Bind the listen address and serve until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(addr = %self.listen_addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    ///
    /// In-flight scrapes are allowed to finish.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.scraper);
        let addr = listener.local_addr()?;

        info!(addr = %addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                // Wait for shutdown signal
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

/// Wait up to `grace` for a server task to stop after shutdown was signalled.
///
/// Returns `true` only when the server stopped cleanly in time.
pub async fn wait_for_stop(task: JoinHandle<anyhow::Result<()>>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(Ok(()))) => true,
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "HTTP server stopped with an error");
            false
        }
        Ok(Err(e)) => {
            warn!(error = %e, "HTTP server task failed");
            false
        }
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs(),
                "In-flight scrapes did not finish before the shutdown deadline"
            );
            false
        }
    }
}
