//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake)
//!     → Hand off to HTTP layer
//!
//! Accepted WebSocket relay
//!     → connection.rs (RelayGuard held until both legs close)
//! ```
//!
//! # Design Decisions
//! - TLS is optional and terminated before the router sees the request
//! - Shutdown waits on the live relay count, not on polling

pub mod connection;
pub mod tls;
