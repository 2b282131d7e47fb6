//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Flag set → Stop accepting → Close live relays (1001) → Drain → Exit
//!     Relays accepted after the flag is set close straight away
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, close relays, drain
//! - Drain has a deadline: remaining relays are dropped after it

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
