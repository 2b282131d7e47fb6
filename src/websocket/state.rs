//! Relay state machine.
//!
//! ```text
//! HandshakingClient → HandshakingUpstream → Relaying → Closing → Closed
//!         └──────────────────┴───────────────┴──────────┴──→ Closing / Closed
//! ```

use crate::net::connection::RelayId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    HandshakingClient,
    HandshakingUpstream,
    Relaying,
    Closing,
    Closed,
}

impl RelayState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: RelayState) -> bool {
        use RelayState::*;
        match (self, next) {
            (Closed, _) => false,
            (Closing, Closed) => true,
            (Closing, _) => false,
            (_, Closing | Closed) => true,
            (HandshakingClient, HandshakingUpstream) => true,
            (HandshakingUpstream, Relaying) => true,
            _ => false,
        }
    }

    pub fn is_open(self) -> bool {
        !matches!(self, RelayState::Closing | RelayState::Closed)
    }
}

/// Tracks one relay's state and logs its transitions.
#[derive(Debug)]
pub struct StateMachine {
    id: RelayId,
    state: RelayState,
}

impl StateMachine {
    pub fn new(id: RelayId) -> Self {
        Self {
            id,
            state: RelayState::HandshakingClient,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Move to `next`. Illegal or repeated moves are ignored and return false,
    /// which makes closing an already-closed relay a no-op.
    pub fn advance(&mut self, next: RelayState) -> bool {
        if !self.state.can_advance_to(next) {
            tracing::trace!(relay = %self.id, from = ?self.state, to = ?next, "Ignoring state transition");
            return false;
        }
        tracing::debug!(relay = %self.id, from = ?self.state, to = ?next, "Relay state changed");
        self.state = next;
        true
    }
}
