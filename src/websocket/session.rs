//! One client WebSocket session from upgrade request to close.
//!
//! # Flow
//! ```text
//! accept(): dial upstream with rewritten headers and the client's subprotocols
//!     → dial ok: answer 101 echoing the upstream's subprotocol
//!         → RelayPair::run until either side stops
//!     → dial failed: answer 101, then close client 1011
//! ```

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::http::request::Parts;
use axum::response::Response;
use tracing::{Instrument, Span};

use super::bridge::{adapt, close_leg, RelayPair};
use super::dial::{offered_protocols, Dialed, Dialer, DirectDialer, UpgradeDialer};
use super::frame::{CloseReason, ABNORMAL};
use super::state::{RelayState, StateMachine};
use crate::config::WebSocketStrategy;
use crate::error::RelayError;
use crate::http::server::AppState;
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::RelayGuard;
use crate::observability::metrics;
use crate::security::{rewrite, Caller};

/// Open the upstream leg, then complete the client handshake and spawn the relay.
pub async fn accept(ws: WebSocketUpgrade, parts: &Parts, state: &AppState, caller: Caller) -> Response {
    let guard = state.relays.track();
    let span = tracing::info_span!(
        "relay",
        id = %guard.id(),
        peer = %caller.addr,
        upstream = %state.config.upstream.target,
        path = %parts.uri.path(),
    );

    let session = Session {
        machine: StateMachine::new(guard.id()),
        guard,
        state: state.clone(),
        shutdown: state.shutdown.subscribe(),
    };
    let headers = rewrite(&parts.headers, &state.config.upstream.target, &caller, true);

    let connect_timeout = state.config.timeouts.connect();
    match state.config.upstream.websocket_strategy {
        WebSocketStrategy::Direct => {
            let dialer = DirectDialer::new(connect_timeout);
            session.open(dialer, ws, parts, headers, span).await
        }
        WebSocketStrategy::Upgrade => {
            let dialer = UpgradeDialer::new(state.client.clone(), connect_timeout);
            session.open(dialer, ws, parts, headers, span).await
        }
    }
}

/// Close reason sent to the client when the upstream leg cannot be opened.
fn unavailable_reason(err: &RelayError) -> &'static str {
    match err {
        RelayError::UpgradeRefused(_) | RelayError::Handshake(_) => "upstream rejected handshake",
        _ => "upstream unavailable",
    }
}

struct Session {
    /// Held for the session's lifetime so shutdown can wait for it.
    guard: RelayGuard,
    machine: StateMachine,
    state: AppState,
    shutdown: ShutdownSignal,
}

impl Session {
    async fn open<D: Dialer>(
        mut self,
        dialer: D,
        ws: WebSocketUpgrade,
        parts: &Parts,
        headers: axum::http::HeaderMap,
        span: Span,
    ) -> Response {
        self.machine.advance(RelayState::HandshakingUpstream);
        let target = &self.state.config.upstream.target;
        let dialed = dialer.dial(target, &parts.uri, headers).instrument(span.clone()).await;

        match dialed {
            Ok(upstream) => {
                let ws = match upstream.protocol.clone() {
                    Some(protocol) => ws.protocols([protocol]),
                    None => ws,
                };
                ws.on_failed_upgrade(|e| tracing::warn!(error = %e, "Client WebSocket upgrade failed"))
                    .on_upgrade(move |client| self.relay(client, upstream).instrument(span))
            }
            Err(e) => {
                tracing::warn!(parent: &span, error = %e, kind = e.kind(), "Upstream WebSocket unavailable");
                metrics::record_upstream_error(e.kind());
                let reason = unavailable_reason(&e);

                // The client still needs a handshake it accepts to read the close frame.
                ws.protocols(offered_protocols(&parts.headers))
                    .on_failed_upgrade(|e| tracing::warn!(error = %e, "Client WebSocket upgrade failed"))
                    .on_upgrade(move |client| self.refuse(client, reason).instrument(span))
            }
        }
    }

    async fn refuse(mut self, client: WebSocket, reason: &'static str) {
        self.machine.advance(RelayState::Closed);
        let (mut client_tx, _client_rx) = adapt(client);
        close_leg(&mut client_tx, Some(CloseReason::new(ABNORMAL, reason))).await;
        drop(self.guard);
    }

    async fn relay<Io>(mut self, client: WebSocket, upstream: Dialed<Io>)
    where
        Io: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!(protocol = ?upstream.protocol, "WebSocket relay established");
        metrics::websocket_opened();

        let termination = RelayPair::new(client, upstream.socket, self.machine)
            .run(self.state.config.timeouts.idle(), &mut self.shutdown)
            .await;

        let code = termination.close_frame().map(|f| f.code);
        metrics::websocket_closed(code);
        tracing::info!(
            trigger = ?termination.side(),
            code = ?code,
            "WebSocket relay closed"
        );
        drop(self.guard);
    }
}
