//! Request classification and dispatch.
//!
//! # Responsibilities
//! - Decide whether an inbound request is a WebSocket upgrade or plain HTTP
//! - Hand it to the matching relay
//!
//! # Design Decisions
//! - Classification reads headers only, nothing from the body
//! - Every request is routed to the one configured upstream

use axum::body::Body;
use axum::extract::{FromRequestParts, WebSocketUpgrade};
use axum::http::{header, HeaderMap, Request};
use axum::response::{IntoResponse, Response};

use crate::http::relay;
use crate::http::AppState;
use crate::security::Caller;
use crate::websocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Http,
    WebSocket,
}

/// A request is a WebSocket upgrade when `Upgrade` names `websocket`.
pub fn classify(headers: &HeaderMap) -> RequestKind {
    let upgrade = headers
        .get_all(header::UPGRADE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("websocket"));

    if upgrade {
        RequestKind::WebSocket
    } else {
        RequestKind::Http
    }
}

/// Route one inbound request to the HTTP or WebSocket relay.
pub async fn dispatch(state: &AppState, caller: Caller, request: Request<Body>) -> Response {
    match classify(request.headers()) {
        RequestKind::WebSocket => {
            let (mut parts, _body) = request.into_parts();
            match WebSocketUpgrade::from_request_parts(&mut parts, state).await {
                Ok(ws) => websocket::accept(ws, &parts, state, caller).await,
                Err(rejection) => {
                    tracing::debug!(path = %parts.uri.path(), reason = %rejection.body_text(), "Rejected WebSocket upgrade");
                    rejection.into_response()
                }
            }
        }
        RequestKind::Http => relay::forward(state, caller, request).await,
    }
}
