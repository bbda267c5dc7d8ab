//! Axum HTTP server hosting a bridge

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use super::routes::build_router;
use crate::hue::bridge::{Bridge, BridgeConfig};
use crate::hue::client::APPLICATION_KEY_HEADER;
use crate::{error::ControlError, Result};

/// Router with request tracing, ready to serve
pub fn build_app(bridge: Bridge) -> Router {
    build_router(bridge)
        .layer(middleware::from_fn(trace_application_key))
        .layer(TraceLayer::new_for_http())
}

/// A running resource API server.
///
/// The HTTP side runs as a tokio task; the bridge's stream listener runs on
/// its own thread once streaming is started.
pub struct BridgeServer {
    bridge: Bridge,
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl BridgeServer {
    /// Bind the API port from `config` and start serving.
    ///
    /// With port 0 the bound port is reported by [`local_addr`](Self::local_addr).
    /// Must be called from within a tokio runtime.
    pub async fn bind(config: BridgeConfig) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| ControlError::HttpError(format!("Failed to bind: {}", e)))?;
        let local_addr = listener.local_addr()?;

        // An ephemeral API port still gets its stream port at a fixed offset
        let config = if config.port == 0 && config.stream_port.is_none() {
            let port = local_addr.port();
            config.with_port(port)
        } else {
            config
        };

        let bridge = Bridge::new(config);
        let app = build_app(bridge.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tracing::info!("Bridge resource API listening on {}", local_addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .map_err(|e| ControlError::HttpError(format!("Server error: {}", e)))
        });

        Ok(Self {
            bridge,
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the hosted bridge
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Stop accepting requests, wait for in-flight ones, and stop streaming
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let result = match self.handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| ControlError::HttpError(format!("Server task failed: {}", e)))
                .and_then(|r| r),
            None => Ok(()),
        };

        // Joining the listener thread blocks for up to one poll interval
        let bridge = self.bridge.clone();
        tokio::task::spawn_blocking(move || bridge.shutdown())
            .await
            .map_err(|e| ControlError::StreamError(format!("Listener shutdown failed: {}", e)))?;

        tracing::info!("Bridge on {} shut down", self.local_addr);
        result
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Trace the caller's application key. Keys are never validated.
async fn trace_application_key(req: Request, next: Next) -> Response {
    match req
        .headers()
        .get(APPLICATION_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(key) => tracing::trace!(
            "{} {} (application key {})",
            req.method(),
            req.uri().path(),
            key
        ),
        None => tracing::trace!(
            "{} {} without application key",
            req.method(),
            req.uri().path()
        ),
    }
    next.run(req).await
}
