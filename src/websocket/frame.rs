//! Library-neutral WebSocket frames and close semantics.
//!
//! The client leg is an axum socket and the upstream leg a tungstenite
//! socket. Both are mapped onto [`Frame`] so a single bridge routine serves
//! both directions.

use axum::extract::ws as client;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code for failures ("internal error").
pub const ABNORMAL: u16 = 1011;
/// Close code for idle timeout and shutdown ("going away").
pub const GOING_AWAY: u16 = 1001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
    /// Ping or pong. Answered per leg, never relayed.
    Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// One leg of a relay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Upstream,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Upstream => write!(f, "upstream"),
        }
    }
}

/// Why a relay pair stopped relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A leg sent a close frame.
    Closed { side: Side, frame: Option<CloseReason> },
    /// A leg reported an error.
    Failed { side: Side },
    /// A leg ended without a close frame.
    Lost { side: Side },
    /// No data frame in either direction for the idle timeout.
    Idle,
    /// The proxy is shutting down.
    Shutdown,
}

impl Termination {
    /// The leg that triggered the termination, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Termination::Closed { side, .. }
            | Termination::Failed { side }
            | Termination::Lost { side } => Some(*side),
            Termination::Idle | Termination::Shutdown => None,
        }
    }

    /// The close frame both legs are closed with.
    pub fn close_frame(&self) -> Option<CloseReason> {
        match self {
            Termination::Closed { frame, .. } => frame.clone(),
            Termination::Failed { side } => Some(CloseReason::new(ABNORMAL, format!("{side} error"))),
            Termination::Lost { side } => {
                Some(CloseReason::new(ABNORMAL, format!("{side} connection lost")))
            }
            Termination::Idle => Some(CloseReason::new(GOING_AWAY, "idle timeout")),
            Termination::Shutdown => Some(CloseReason::new(GOING_AWAY, "proxy shutting down")),
        }
    }
}

impl From<client::Message> for Frame {
    fn from(message: client::Message) -> Self {
        match message {
            client::Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            client::Message::Binary(data) => Frame::Binary(data),
            client::Message::Close(frame) => Frame::Close(frame.map(|f| CloseReason {
                code: f.code,
                reason: f.reason.as_str().to_owned(),
            })),
            client::Message::Ping(_) | client::Message::Pong(_) => Frame::Control,
        }
    }
}

impl From<Frame> for client::Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => client::Message::Text(text.into()),
            Frame::Binary(data) => client::Message::Binary(data),
            Frame::Close(reason) => client::Message::Close(reason.map(|r| client::CloseFrame {
                code: r.code,
                reason: r.reason.into(),
            })),
            // An unsolicited pong is a valid heartbeat.
            Frame::Control => client::Message::Pong(Bytes::new()),
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(data) => Frame::Binary(data),
            Message::Close(frame) => Frame::Close(frame.map(|f| CloseReason {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_owned(),
            })),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Frame::Control,
        }
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(data) => Message::Binary(data),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
            Frame::Control => Message::Pong(Bytes::new()),
        }
    }
}
