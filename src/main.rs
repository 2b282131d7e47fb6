//! relay-proxy
//!
//! Forwards every inbound request to one configured upstream origin.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                   RELAY PROXY                     │
//!                     │                                                   │
//!   Client Request    │  ┌─────────┐    ┌──────────┐    ┌─────────────┐  │
//!   ──────────────────┼─▶│  http   │───▶│ routing  │───▶│ http::relay │──┼──▶ Upstream
//!                     │  │ server  │    │ classify │    └─────────────┘  │
//!                     │  └─────────┘    └────┬─────┘                     │
//!                     │                      │ Upgrade: websocket        │
//!                     │                      ▼                           │
//!   Client Socket     │               ┌─────────────┐                    │
//!   ◀═════════════════┼══════════════▶│  websocket  │◀═══════════════════┼══▶ Upstream
//!                     │               │ relay pair  │                    │    Socket
//!                     │               └─────────────┘                    │
//!                     │                                                   │
//!                     │  security (header rewrite, CORS) · config ·       │
//!                     │  observability · lifecycle                        │
//!                     └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;

use relay_proxy::config::cli::Cli;
use relay_proxy::lifecycle::signals::wait_for_signal;
use relay_proxy::observability::{logging, metrics};
use relay_proxy::{HttpServer, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "relay-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.target,
        websocket_strategy = ?config.upstream.websocket_strategy,
        tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    let tls = config.listener.tls.is_some();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, shutdown);

    if tls {
        server.run_tls().await?;
    } else {
        let listener = TcpListener::bind(&bind_address).await?;
        server.run(listener).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
