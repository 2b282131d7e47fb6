//! Relay error taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that can occur while reaching the upstream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// DNS, connect, TLS or protocol failure in the HTTP client.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// Connecting to the upstream took longer than the configured timeout.
    #[error("upstream connect timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered an upgrade request without switching protocols.
    #[error("upstream refused websocket upgrade with status {0}")]
    UpgradeRefused(StatusCode),

    /// The upstream switched protocols but the handshake was not valid.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("upgrade failed: {0}")]
    Upgrade(#[from] hyper::Error),

    #[error("invalid upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

impl RelayError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Upstream(e) if e.is_connect() => "connect",
            RelayError::Upstream(_) => "upstream",
            RelayError::Timeout(_) => "timeout",
            RelayError::UpgradeRefused(_) => "upgrade_refused",
            RelayError::Handshake(_) => "handshake",
            RelayError::WebSocket(_) => "websocket",
            RelayError::Upgrade(_) => "upgrade",
            RelayError::Request(_) => "request",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let message = match &self {
            RelayError::Timeout(_) => "Bad Gateway: upstream did not respond in time",
            RelayError::UpgradeRefused(_) | RelayError::Handshake(_) => {
                "Bad Gateway: upstream refused the WebSocket upgrade"
            }
            RelayError::Request(_) => "Bad Gateway: could not build the upstream request",
            _ => "Bad Gateway: upstream unreachable",
        };
        (StatusCode::BAD_GATEWAY, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RelayError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "upstream connect timed out after 5s");

        let err = RelayError::UpgradeRefused(StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("403"));
        assert_eq!(err.kind(), "upgrade_refused");
    }

    #[test]
    fn renders_bad_gateway() {
        let response = RelayError::Timeout(Duration::from_secs(1)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
