//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → headers.rs (rewrite for the upstream leg)
//!     → relay (HTTP or WebSocket)
//!
//! Upstream response headers
//!     → cors.rs (Access-Control-* for the caller)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Both policies are pure and built from immutable config
//! - Header maps are rebuilt per request, never shared

pub mod cors;
pub mod headers;

pub use cors::CorsPolicy;
pub use headers::{rewrite, Caller, ClientScheme};
