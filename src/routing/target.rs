//! Upstream URI resolution.
//!
//! The upstream URI is always the configured target's scheme and authority
//! with the inbound path and query copied on byte for byte. Scheme, host and
//! port never come from the request, and the path is never normalized.

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;
use url::{Position, Url};

/// Resolve the HTTP upstream URI for an inbound request URI.
pub fn upstream_url(target: &Url, uri: &Uri) -> Result<Uri, axum::http::Error> {
    build(target, target.scheme(), uri)
}

/// Resolve the WebSocket upstream URI (`http` → `ws`, `https` → `wss`).
pub fn websocket_url(target: &Url, uri: &Uri) -> Result<Uri, axum::http::Error> {
    let scheme = match target.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    build(target, scheme, uri)
}

fn build(target: &Url, scheme: &str, uri: &Uri) -> Result<Uri, axum::http::Error> {
    let authority = Authority::try_from(&target[Position::BeforeHost..Position::AfterPort])?;
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(Scheme::try_from(scheme)?)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
}
