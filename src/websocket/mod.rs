//! WebSocket relay subsystem.
//!
//! # Data Flow
//! ```text
//! Client upgrade (session.rs)
//!     → Upstream dial (dial.rs: direct ws/wss or HTTP upgrade)
//!     → Relay pair (bridge.rs):
//!         client  ──frames──→ upstream
//!         upstream ──frames──→ client
//!     → First close/error/idle/shutdown closes both legs
//! ```
//!
//! # Design Decisions
//! - Both libraries' messages map onto one [`frame::Frame`] type
//! - Only text and binary frames are relayed; ping/pong stay on their leg
//! - State transitions are explicit (state.rs) and closing is idempotent

pub mod bridge;
pub mod dial;
pub mod frame;
pub mod session;
pub mod state;

pub use session::accept;
