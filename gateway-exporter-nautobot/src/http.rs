//! HTTP server for the Prometheus metrics endpoint.
//!
//! The server is meant to stay up for the whole process lifetime. Failures
//! are fed into a [`RestartPolicy`]: the server is re-bound after a backoff
//! unless the same failure has repeated too often, in which case the
//! [`FatalHandler`] is invoked.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::collector::SharedCollector;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
}

/// Create the HTTP router.
pub fn create_router(collector: SharedCollector, metrics_path: &str) -> Router {
    let state = AppState { collector };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.collector.render();

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Metrics server failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },
    #[error("Metrics server error: {0}")]
    Serve(String),
}

/// What to do after a server failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Retry,
    Fatal,
}

/// Tracks consecutive identical server failures.
///
/// The count includes the failure just recorded. A different message resets
/// it to one.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    max_consecutive_failures: u32,
    last_error: Option<String>,
    consecutive: u32,
}

impl RestartPolicy {
    pub fn new(max_consecutive_failures: u32) -> Self {
        Self {
            max_consecutive_failures: max_consecutive_failures.max(1),
            last_error: None,
            consecutive: 0,
        }
    }

    pub fn record_failure(&mut self, message: &str) -> RestartDecision {
        if self.last_error.as_deref() == Some(message) {
            self.consecutive += 1;
        } else {
            self.last_error = Some(message.to_string());
            self.consecutive = 1;
        }

        if self.consecutive >= self.max_consecutive_failures {
            RestartDecision::Fatal
        } else {
            RestartDecision::Retry
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Called with the last failure message once restarts are exhausted.
pub type FatalHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Fatal handler that terminates the process.
pub fn exit_process() -> FatalHandler {
    Arc::new(|_: &str| std::process::exit(1))
}

/// Self-healing metrics HTTP server.
pub struct MetricsServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
    max_consecutive_failures: u32,
    restart_backoff: Duration,
    fatal_handler: FatalHandler,
}

impl MetricsServer {
    pub fn new(
        collector: SharedCollector,
        listen_addr: SocketAddr,
        metrics_path: impl Into<String>,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path: metrics_path.into(),
            max_consecutive_failures: 3,
            restart_backoff: Duration::from_secs(1),
            fatal_handler: exit_process(),
        }
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn with_restart_backoff(mut self, backoff: Duration) -> Self {
        self.restart_backoff = backoff;
        self
    }

    pub fn with_fatal_handler(mut self, handler: FatalHandler) -> Self {
        self.fatal_handler = handler;
        self
    }

    /// Bind and serve once. Only returns on failure.
    pub async fn serve_once(&self) -> Result<(), ServerError> {
        let router = create_router(self.collector.clone(), &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: self.listen_addr,
                message: e.to_string(),
            })?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "Metrics server listening"
        );

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        Err(ServerError::Serve("server exited unexpectedly".to_string()))
    }

    /// Serve until restarts are exhausted, then invoke the fatal handler.
    pub async fn run(self) {
        let mut policy = RestartPolicy::new(self.max_consecutive_failures);

        loop {
            let err = match self.serve_once().await {
                Ok(()) => ServerError::Serve("server exited unexpectedly".to_string()),
                Err(e) => e,
            };
            let message = err.to_string();

            match policy.record_failure(&message) {
                RestartDecision::Retry => {
                    warn!(
                        error = %message,
                        consecutive = policy.consecutive_failures(),
                        backoff_ms = self.restart_backoff.as_millis() as u64,
                        "Metrics server failed, restarting"
                    );
                    tokio::time::sleep(self.restart_backoff).await;
                }
                RestartDecision::Fatal => {
                    error!(
                        error = %message,
                        consecutive = policy.consecutive_failures(),
                        "Metrics server failed repeatedly, giving up"
                    );
                    (self.fatal_handler)(&message);
                    return;
                }
            }
        }
    }
}
