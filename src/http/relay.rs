//! Plain HTTP forwarding.
//!
//! # Responsibilities
//! - Resolve the upstream URL and rewrite request headers
//! - Stream the request body up and the response body back
//! - Apply the response header policy
//! - Turn upstream failures into `502`
//!
//! # Design Decisions
//! - One attempt per request; no retries, no redirects followed
//! - Bodies are never buffered or decoded
//! - Dropping the handler future (caller went away) drops the upstream call

use std::time::Instant;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, Method, Request};
use axum::response::{IntoResponse, Response};
use hyper::body::Incoming;

use super::request::request_id;
use super::response::apply_policy;
use super::server::AppState;
use crate::error::RelayError;
use crate::observability::metrics;
use crate::routing::target::upstream_url;
use crate::security::{rewrite, Caller};

/// Relay one HTTP request to the upstream.
pub async fn forward(state: &AppState, caller: Caller, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let origin = parts.headers.get(header::ORIGIN).cloned();

    if parts.method == Method::OPTIONS && state.cors.answers_preflight() {
        tracing::debug!(path = %parts.uri.path(), "Answering CORS preflight");
        return state.cors.preflight(origin.as_ref()).into_response();
    }

    let request_id = request_id(&parts.headers).to_owned();
    let result = send(state, &parts, &caller, body, &request_id).await;

    match result {
        Ok(response) => {
            let (mut head, body) = response.into_parts();
            apply_policy(&mut head.headers, &state.cors, origin.as_ref());
            metrics::record_request(parts.method.as_str(), head.status.as_u16(), start);
            Response::from_parts(head, Body::new(body))
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                upstream = %state.config.upstream.target,
                path = %parts.uri.path(),
                kind = e.kind(),
                error = %e,
                "Upstream request failed"
            );
            metrics::record_upstream_error(e.kind());
            metrics::record_request(parts.method.as_str(), 502, start);

            let mut response = e.into_response();
            state.cors.apply(origin.as_ref(), response.headers_mut());
            response
        }
    }
}

async fn send(
    state: &AppState,
    parts: &Parts,
    caller: &Caller,
    body: Body,
    request_id: &str,
) -> Result<Response<Incoming>, RelayError> {
    let target = &state.config.upstream.target;
    let uri = upstream_url(target, &parts.uri)?;
    tracing::debug!(request_id = %request_id, method = %parts.method, uri = %uri, "Forwarding request");

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = rewrite(&parts.headers, target, caller, false);
    }
    let outbound = builder.body(body)?;
    Ok(state.client.request(outbound).await?)
}
