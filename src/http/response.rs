//! Response header policy.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from upstream responses
//! - Add the CORS headers for the caller
//!
//! # Design Decisions
//! - Bodies are streamed untouched, so `Content-Encoding` and
//!   `Content-Length` still describe the bytes and are kept
//! - Headers named in `Connection` are hop-by-hop too (RFC 9110 §7.6.1)

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::security::CorsPolicy;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Rewrite upstream response headers for the caller.
pub fn apply_policy(headers: &mut HeaderMap, cors: &CorsPolicy, request_origin: Option<&HeaderValue>) {
    strip_hop_by_hop(headers);
    cors.apply(request_origin, headers);
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
