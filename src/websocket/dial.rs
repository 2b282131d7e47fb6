//! Upstream WebSocket dialers.
//!
//! # Strategies
//! - [`DirectDialer`]: a standalone WebSocket client connection (`ws`/`wss`)
//! - [`UpgradeDialer`]: an HTTP/1.1 upgrade request through the shared HTTP
//!   client, then the upgraded stream is wrapped as a WebSocket
//!
//! Both send the rewritten header set, offer the client's subprotocols, and
//! honor the optional connect timeout. The subprotocol the upstream selects is
//! the one echoed to the client.

use std::future::Future;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::RelayError;
use crate::http::client::UpstreamClient;
use crate::resilience::bounded;
use crate::routing::target::{upstream_url, websocket_url};

/// Handshake fields each dialer produces itself.
const HANDSHAKE_HEADERS: [HeaderName; 7] = [
    header::CONNECTION,
    header::UPGRADE,
    header::SEC_WEBSOCKET_VERSION,
    header::SEC_WEBSOCKET_KEY,
    header::SEC_WEBSOCKET_ACCEPT,
    header::SEC_WEBSOCKET_EXTENSIONS,
    header::SEC_WEBSOCKET_PROTOCOL,
];

/// An open upstream leg.
pub struct Dialed<Io> {
    pub socket: WebSocketStream<Io>,
    /// Subprotocol the upstream selected, if any.
    pub protocol: Option<String>,
}

/// Opens the upstream leg of a relay.
pub trait Dialer {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn dial(
        &self,
        target: &Url,
        uri: &Uri,
        headers: HeaderMap,
    ) -> impl Future<Output = Result<Dialed<Self::Io>, RelayError>> + Send;
}

/// Subprotocols offered in `headers`, in order.
pub fn offered_protocols(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SEC_WEBSOCKET_PROTOCOL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Put the offered subprotocols on `to` as a single header line.
fn offer_protocols(offered: &[String], to: &mut HeaderMap) -> Result<(), RelayError> {
    if offered.is_empty() {
        return Ok(());
    }
    let value = HeaderValue::from_str(&offered.join(", "))
        .map_err(|_| RelayError::Handshake("invalid subprotocol offer".to_string()))?;
    to.insert(header::SEC_WEBSOCKET_PROTOCOL, value);
    Ok(())
}

/// The upstream must pick one of the offered subprotocols, or none when none
/// were offered.
fn selected_protocol(offered: &[String], response: &HeaderMap) -> Result<Option<String>, RelayError> {
    let selected = response
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .map(|v| v.to_str().map(|s| s.trim().to_owned()))
        .transpose()
        .map_err(|_| RelayError::Handshake("unreadable Sec-WebSocket-Protocol".to_string()))?;

    match selected {
        None if offered.is_empty() => Ok(None),
        None => Err(RelayError::Handshake("upstream selected no subprotocol".to_string())),
        Some(protocol) if offered.contains(&protocol) => Ok(Some(protocol)),
        Some(protocol) => Err(RelayError::Handshake(format!(
            "upstream selected unrequested subprotocol {protocol:?}"
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct DirectDialer {
    connect_timeout: Option<Duration>,
}

impl DirectDialer {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

impl Dialer for DirectDialer {
    type Io = MaybeTlsStream<TcpStream>;

    async fn dial(
        &self,
        target: &Url,
        uri: &Uri,
        headers: HeaderMap,
    ) -> Result<Dialed<Self::Io>, RelayError> {
        let mut request = websocket_url(target, uri)?.into_client_request()?;
        let offered = offered_protocols(&headers);

        // tungstenite writes Host from the URL, which matches the rewritten value.
        copy_forwardable(&headers, request.headers_mut(), |name| *name == header::HOST);
        offer_protocols(&offered, request.headers_mut())?;

        let (socket, response) = bounded(self.connect_timeout, tokio_tungstenite::connect_async(request))
            .await?
            .map_err(refusal)?;
        let protocol = selected_protocol(&offered, response.headers())?;
        Ok(Dialed { socket, protocol })
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeDialer {
    client: UpstreamClient,
    connect_timeout: Option<Duration>,
}

impl UpgradeDialer {
    pub fn new(client: UpstreamClient, connect_timeout: Option<Duration>) -> Self {
        Self {
            client,
            connect_timeout,
        }
    }
}

impl Dialer for UpgradeDialer {
    type Io = TokioIo<Upgraded>;

    async fn dial(
        &self,
        target: &Url,
        uri: &Uri,
        headers: HeaderMap,
    ) -> Result<Dialed<Self::Io>, RelayError> {
        let key = generate_key();
        let offered = offered_protocols(&headers);

        let mut builder = Request::builder().method(Method::GET).uri(upstream_url(target, uri)?);
        if let Some(outbound) = builder.headers_mut() {
            copy_forwardable(&headers, outbound, |_| false);
            offer_protocols(&offered, outbound)?;
            outbound.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
            outbound.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
            outbound.insert(header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
            if let Ok(key) = HeaderValue::from_str(&key) {
                outbound.insert(header::SEC_WEBSOCKET_KEY, key);
            }
        }
        let request = builder.body(Body::empty())?;

        let response = bounded(self.connect_timeout, self.client.request(request)).await??;
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(RelayError::UpgradeRefused(response.status()));
        }

        let expected = derive_accept_key(key.as_bytes());
        let accepted = response
            .headers()
            .get(header::SEC_WEBSOCKET_ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if !accepted {
            return Err(RelayError::Handshake(
                "missing or invalid Sec-WebSocket-Accept".to_string(),
            ));
        }

        let protocol = selected_protocol(&offered, response.headers())?;

        let upgraded = hyper::upgrade::on(response).await?;
        let socket = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Client, None).await;
        Ok(Dialed { socket, protocol })
    }
}

fn copy_forwardable(from: &HeaderMap, to: &mut HeaderMap, skip: impl Fn(&HeaderName) -> bool) {
    for (name, value) in from {
        if HANDSHAKE_HEADERS.contains(name) || skip(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

/// A non-101 answer or a bad handshake is a refusal; anything else is a
/// transport failure.
fn refusal(err: tungstenite::Error) -> RelayError {
    match err {
        tungstenite::Error::Http(response) => RelayError::UpgradeRefused(response.status()),
        tungstenite::Error::Protocol(e) => RelayError::Handshake(e.to_string()),
        other => RelayError::WebSocket(other),
    }
}
