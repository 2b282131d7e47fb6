//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all relay handler
//! - Wire up middleware (request ID, tracing)
//! - Bind to a plain or TLS listener
//! - Stop accepting on shutdown, close live relays and drain them

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::client::{build_client, UpstreamClient};
use crate::config::ProxyConfig;
use crate::lifecycle::Shutdown;
use crate::net::connection::RelayTracker;
use crate::net::tls::load_tls_config;
use crate::routing;
use crate::security::{Caller, ClientScheme, CorsPolicy};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: UpstreamClient,
    pub cors: Arc<CorsPolicy>,
    /// Scheme callers use to reach this listener.
    pub scheme: ClientScheme,
    /// Live WebSocket relays.
    pub relays: RelayTracker,
    pub shutdown: Shutdown,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server. Triggering `shutdown` stops it and closes every relay.
    pub fn new(config: ProxyConfig, shutdown: Shutdown) -> Self {
        let scheme = if config.listener.tls.is_some() {
            ClientScheme::Https
        } else {
            ClientScheme::Http
        };

        let state = AppState {
            client: build_client(&config.timeouts),
            cors: Arc::new(CorsPolicy::from_config(&config.cors)),
            config: Arc::new(config),
            scheme,
            relays: RelayTracker::new(),
            shutdown,
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.state.config
    }

    pub fn relays(&self) -> &RelayTracker {
        &self.state.relays
    }

    /// Serve plain HTTP on `listener` until shutdown.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.state.config.upstream.target,
            "HTTP server starting"
        );

        let mut signal = self.state.shutdown.subscribe();
        let mut deadline = self.state.shutdown.subscribe();
        let grace = self.state.config.timeouts.drain();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.recv().await })
            .into_future();

        // Graceful shutdown alone waits on every open connection, streaming
        // responses included.
        tokio::select! {
            result = server => result?,
            _ = async {
                deadline.recv().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace = ?grace, "Drain deadline reached, abandoning open HTTP connections");
            }
        }

        drain(&self.state).await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on the configured bind address until shutdown.
    pub async fn run_tls(self) -> Result<(), std::io::Error> {
        let listener = &self.state.config.listener;
        let tls = listener.tls.clone().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "TLS is not configured")
        })?;
        let addr: SocketAddr = listener
            .bind_address
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

        tracing::info!(
            address = %addr,
            upstream = %self.state.config.upstream.target,
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let mut signal = self.state.shutdown.subscribe();
        let grace = self.state.config.timeouts.drain();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            signal.recv().await;
            signal_handle.graceful_shutdown(Some(grace));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app)
            .await?;

        drain(&self.state).await;
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Wait for live relays to finish closing, up to the drain deadline.
async fn drain(state: &AppState) {
    let active = state.relays.live();
    if active == 0 {
        return;
    }
    tracing::info!(relays = active, "Draining WebSocket relays");
    let remaining = state.relays.drained(state.config.timeouts.drain()).await;
    if remaining > 0 {
        tracing::warn!(relays = remaining, "Drain deadline reached, dropping relays");
    }
}

/// Catch-all handler: classify and relay.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let caller = Caller::new(addr, state.scheme);
    routing::dispatch(&state, caller, request).await
}
