//! Header rewrite policy for upstream-bound requests.
//!
//! # Responsibilities
//! - Copy the caller's headers
//! - Point `Host` and `Origin` at the upstream
//! - Set X-Forwarded-For and X-Forwarded-Proto
//! - Fall back to a browser User-Agent when the caller sent none
//!
//! # Design Decisions
//! - Pure function: same inputs, same output, no I/O
//! - `HeaderMap` keys are case-insensitive, so no duplicate-by-case keys
//! - X-Forwarded-For is replaced, never appended

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::net::SocketAddr;
use url::Url;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const SEC_CH_UA_MOBILE: HeaderName = HeaderName::from_static("sec-ch-ua-mobile");

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; K) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36";

/// Per-leg WebSocket handshake fields. The upstream leg negotiates its own.
const WEBSOCKET_LEG_HEADERS: [HeaderName; 3] = [
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_ACCEPT,
    header::SEC_WEBSOCKET_EXTENSIONS,
];

/// Scheme the caller used to reach the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientScheme {
    Http,
    Https,
}

impl ClientScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientScheme::Http => "http",
            ClientScheme::Https => "https",
        }
    }
}

/// The network identity of whoever sent the inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub addr: SocketAddr,
    pub scheme: ClientScheme,
}

impl Caller {
    pub fn new(addr: SocketAddr, scheme: ClientScheme) -> Self {
        Self { addr, scheme }
    }
}

/// Build the outbound header set for one upstream call.
pub fn rewrite(inbound: &HeaderMap, target: &Url, caller: &Caller, is_websocket: bool) -> HeaderMap {
    let mut headers = inbound.clone();

    if is_websocket {
        for name in &WEBSOCKET_LEG_HEADERS {
            headers.remove(name);
        }
    }

    if let Ok(host) = HeaderValue::from_str(&authority(target)) {
        headers.insert(header::HOST, host);
    }

    if let Ok(origin) = HeaderValue::from_str(&target.origin().ascii_serialization()) {
        headers.insert(header::ORIGIN, origin);
    }

    if let Ok(ip) = HeaderValue::from_str(&caller.addr.ip().to_string()) {
        headers.insert(X_FORWARDED_FOR, ip);
    }
    headers.insert(
        X_FORWARDED_PROTO,
        HeaderValue::from_static(caller.scheme.as_str()),
    );

    if !headers.contains_key(header::USER_AGENT) {
        headers.insert(header::USER_AGENT, HeaderValue::from_static(default_user_agent(inbound)));
    }

    headers
}

/// `host[:port]` of the target, omitting the scheme's default port.
pub fn authority(target: &Url) -> String {
    let host = target.host_str().unwrap_or_default();
    match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn default_user_agent(inbound: &HeaderMap) -> &'static str {
    let mobile = inbound
        .get(SEC_CH_UA_MOBILE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "?1")
        .unwrap_or(false);

    if mobile {
        MOBILE_USER_AGENT
    } else {
        DESKTOP_USER_AGENT
    }
}
