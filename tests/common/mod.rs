//! Shared utilities for integration testing.
//!
//! Starts a mock upstream (HTTP echo + WebSocket endpoints) and the relay on
//! ephemeral ports.

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::Router;
use futures_util::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use relay_proxy::config::ProxyConfig;
use relay_proxy::{HttpServer, Shutdown};

/// Bytes every mock response body starts with on `/gzip`.
pub const GZIP_BYTES: &[u8] = &[0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];

/// How the request body of an `/upload` call ended on the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEnd {
    /// The body stream finished cleanly.
    Complete,
    /// The body stream failed part way.
    Aborted,
}

#[derive(Clone)]
struct UpstreamState {
    hits: Arc<AtomicUsize>,
    stream_dropped: Arc<AtomicBool>,
    upload_bytes: Arc<AtomicUsize>,
    uploads: mpsc::UnboundedSender<UploadEnd>,
    closes: mpsc::UnboundedSender<Option<(u16, String)>>,
}

/// A running mock upstream.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    pub stream_dropped: Arc<AtomicBool>,
    /// Request body bytes `/upload` has read so far.
    pub upload_bytes: Arc<AtomicUsize>,
    pub uploads: mpsc::UnboundedReceiver<UploadEnd>,
    /// Close frames the upstream received on its WebSocket endpoints.
    pub closes: mpsc::UnboundedReceiver<Option<(u16, String)>>,
}

impl MockUpstream {
    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start the mock upstream.
///
/// - `/ws`: echoes text and binary frames
/// - `/ws-close`: closes with 1000 "done" straight away
/// - `/ws-headers`: sends one text frame describing the handshake, then echoes
/// - `/redirect`: 302 to `/elsewhere`
/// - `/status/{code}`: answers with that status
/// - `/gzip`: gzip-labelled bytes
/// - `/stream`: endless chunked body; flags `stream_dropped` when abandoned
/// - `/upload`: reads the request body and reports how it ended
/// - anything else: echoes the request (body, plus headers as `x-echo-*`)
pub async fn start_upstream() -> MockUpstream {
    let (tx, closes) = mpsc::unbounded_channel();
    let (upload_tx, uploads) = mpsc::unbounded_channel();
    let state = UpstreamState {
        hits: Arc::new(AtomicUsize::new(0)),
        stream_dropped: Arc::new(AtomicBool::new(false)),
        upload_bytes: Arc::new(AtomicUsize::new(0)),
        uploads: upload_tx,
        closes: tx,
    };

    let app = Router::new()
        .route("/ws", get(ws_echo))
        .route("/ws-close", get(ws_close))
        .route("/ws-headers", get(ws_headers))
        .route("/redirect", any(redirect))
        .route("/status/{code}", any(status))
        .route("/gzip", get(gzip))
        .route("/stream", get(endless_stream))
        .route("/upload", post(upload))
        .fallback(echo)
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        addr,
        hits: state.hits,
        stream_dropped: state.stream_dropped,
        upload_bytes: state.upload_bytes,
        uploads,
        closes,
    }
}

/// An address nothing listens on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A running relay.
pub struct Proxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl Proxy {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to finish draining.
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(15), self.handle).await;
    }
}

/// Config pointing at `target`, everything else default.
pub fn config_for(target: Url) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.target = target;
    config
}

/// Start the relay on an ephemeral port.
pub async fn spawn_proxy(mut config: ProxyConfig) -> Proxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());
    let handle = tokio::spawn(async move {
        server.run(listener).await.unwrap();
    });

    Proxy {
        addr,
        shutdown,
        handle,
    }
}

/// reqwest client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `check` until it holds or `limit` passes.
pub async fn eventually(limit: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

async fn echo(
    State(state): State<UpstreamState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let mut response = Response::new(Body::from(body));
    let echoed = response.headers_mut();
    for (name, value) in &headers {
        if let Ok(name) = HeaderName::from_bytes(format!("x-echo-{name}").as_bytes()) {
            echoed.append(name, value.clone());
        }
    }
    echoed.insert("x-echo-method", HeaderValue::from_str(method.as_str()).unwrap());
    echoed.insert("x-echo-uri", HeaderValue::from_str(&uri.to_string()).unwrap());
    response
}

async fn redirect(State(state): State<UpstreamState>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response()
}

async fn status(State(state): State<UpstreamState>, Path(code): Path<u16>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(code).unwrap();
    (status, format!("upstream said {code}")).into_response()
}

async fn gzip() -> Response {
    ([(header::CONTENT_ENCODING, "gzip")], GZIP_BYTES).into_response()
}

/// Flags the upstream state when the response body is dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

async fn endless_stream(State(state): State<UpstreamState>) -> Response {
    let flag = DropFlag(state.stream_dropped.clone());
    let chunks = stream::unfold(flag, |flag| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Some((Ok::<_, Infallible>(Bytes::from_static(b"tick\n")), flag))
    });
    Body::from_stream(chunks).into_response()
}

async fn upload(State(state): State<UpstreamState>, body: Body) -> Response {
    let mut chunks = body.into_data_stream();
    let end = loop {
        match chunks.next().await {
            Some(Ok(chunk)) => {
                state.upload_bytes.fetch_add(chunk.len(), Ordering::SeqCst);
            }
            Some(Err(_)) => break UploadEnd::Aborted,
            None => break UploadEnd::Complete,
        }
    };
    let _ = state.uploads.send(end);
    StatusCode::NO_CONTENT.into_response()
}

async fn ws_echo(State(state): State<UpstreamState>, ws: WebSocketUpgrade) -> Response {
    ws.protocols(["chat"])
        .on_upgrade(move |socket| echo_frames(socket, state.closes))
}

async fn ws_close(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket| async move {
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: 1000,
                reason: "done".into(),
            })))
            .await;
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn ws_headers(
    State(state): State<UpstreamState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let read = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let summary = format!(
        "origin={};xff={};proto={};custom={}",
        read("origin"),
        read("x-forwarded-for"),
        read("x-forwarded-proto"),
        read("x-custom"),
    );

    ws.on_upgrade(move |mut socket| async move {
        let _ = socket.send(Message::Text(summary.into())).await;
        echo_frames(socket, state.closes).await;
    })
}

async fn echo_frames(mut socket: WebSocket, closes: mpsc::UnboundedSender<Option<(u16, String)>>) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Message::Close(frame) => {
                let _ = closes.send(frame.map(|f| (f.code, f.reason.as_str().to_owned())));
                break;
            }
            _ => {}
        }
    }
}
