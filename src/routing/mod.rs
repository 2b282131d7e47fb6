//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (headers, path, query)
//!     → router.rs (classify: WebSocket upgrade or HTTP)
//!     → target.rs (upstream URL = target + path + query)
//!     → http::relay or websocket::session
//! ```
//!
//! # Design Decisions
//! - One upstream; no route table
//! - Deterministic: same input always yields the same upstream URL

pub mod router;
pub mod target;

pub use router::{classify, dispatch, RequestKind};
