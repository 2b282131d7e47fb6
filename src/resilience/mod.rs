//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream dial (HTTP upgrade or direct WebSocket):
//!     → timeouts.rs (optional connect deadline)
//!     → On expiry: RelayError::Timeout → 502 / close 1011
//! ```
//!
//! # Design Decisions
//! - No retries: every request is attempted exactly once
//! - Deadlines are optional; absent config means wait indefinitely

pub mod timeouts;

pub use timeouts::bounded;
