use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::error::{Error, Result};

/// Serves the metrics of a registry at `/metrics`.
pub struct MetricsServer {
    listen_addr: SocketAddr,
    registry: Registry,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl MetricsServer {
    /// Creates a new instance of `MetricsServer`.
    #[must_use]
    pub fn new(listen_addr: SocketAddr, registry: Registry) -> Self {
        Self {
            listen_addr,
            registry,
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Starts serving, returning the address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the server was already started or the address
    /// could not be bound.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let router = Router::new()
            .route("/metrics", get(metrics))
            .with_state(self.registry.clone());

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(Error::Bind)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io("failed to get listener address", e))?;

        let shutdown_token = self.shutdown_token.clone();
        self.task_tracker.spawn(async move {
            tokio::select! {
                e = axum::serve(listener, router.into_make_service()).into_future() => {
                    info!("metrics server exited {:?}", e);
                }
                () = shutdown_token.cancelled() => {}
            };
        });

        self.task_tracker.close();

        info!("metrics server listening on {}", local_addr);

        Ok(local_addr)
    }

    /// Stops serving.
    pub async fn shutdown(&self) {
        info!("metrics server shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.wait().await;

        info!("metrics server shutdown");
    }
}

async fn metrics(State(registry): State<Registry>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&registry.gather(), &mut buffer) {
        Ok(()) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
