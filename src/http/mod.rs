//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → routing::dispatch (HTTP or WebSocket)
//!     → relay.rs (rewrite headers, stream to upstream via client.rs)
//!     → response.rs (strip hop-by-hop, add CORS)
//!     → Send to client
//! ```

pub mod client;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
