//! Upstream HTTP client.
//!
//! One pooled client per process, shared by the HTTP relay and the
//! upgrade-based WebSocket dialer. Redirects are never followed: a 3xx from
//! the upstream goes back to the caller as-is.

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::TimeoutConfig;
use crate::net::tls::install_crypto_provider;

pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the client. Plain `http` and `https` targets both work.
pub fn build_client(timeouts: &TimeoutConfig) -> UpstreamClient {
    install_crypto_provider();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(timeouts.connect());

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}
