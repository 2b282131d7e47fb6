//! Request identification.
//!
//! # Responsibilities
//! - Name the request ID header set by the server's middleware
//! - Read it back for log correlation
//!
//! # Design Decisions
//! - IDs are assigned by `tower-http` before the handler runs, so the
//!   header is forwarded upstream like any other inbound header

use axum::http::{HeaderMap, HeaderName};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID carried by `headers`, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}
