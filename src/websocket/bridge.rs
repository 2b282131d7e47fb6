//! Bidirectional frame relay between the client and upstream legs.
//!
//! # Responsibilities
//! - Forward text and binary frames in both directions, in order
//! - Stop at the first close, error, end of stream, idle timeout or shutdown
//! - Close both legs with the same frame, exactly once

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::Instant;

use super::frame::{CloseReason, Frame, Side, Termination};
use super::state::{RelayState, StateMachine};
use crate::lifecycle::ShutdownSignal;

/// Split a socket into a frame sink and a frame stream.
pub fn adapt<T, M, E>(
    socket: T,
) -> (
    impl Sink<Frame, Error = E> + Unpin,
    impl Stream<Item = Result<Frame, E>> + Unpin,
)
where
    T: Sink<M, Error = E> + Stream<Item = Result<M, E>> + Unpin,
    M: From<Frame> + Unpin,
    Frame: From<M>,
{
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<M, E>(M::from(frame))));
    let stream = stream.map(|message| message.map(Frame::from));
    (sink, stream)
}

/// Forward data frames from `source` into `sink` until `source` stops.
///
/// Control frames are answered by the library on their own leg. A send that
/// fails because the destination is already gone drops the frame; the
/// destination's own stream reports the loss.
pub async fn pump<S, K, E>(source: &mut S, sink: &mut K, side: Side, activity: &Activity) -> Termination
where
    S: Stream<Item = Result<Frame, E>> + Unpin,
    K: Sink<Frame> + Unpin,
    K::Error: Display,
    E: Display,
{
    while let Some(next) = source.next().await {
        match next {
            Ok(frame @ (Frame::Text(_) | Frame::Binary(_))) => {
                activity.touch();
                if let Err(e) = sink.send(frame).await {
                    tracing::debug!(from = %side, error = %e, "Dropping frame for closed leg");
                }
            }
            Ok(Frame::Close(frame)) => return Termination::Closed { side, frame },
            Ok(Frame::Control) => {}
            Err(e) => {
                tracing::debug!(side = %side, error = %e, "Leg failed");
                return Termination::Failed { side };
            }
        }
    }
    Termination::Lost { side }
}

/// Send `frame` and close the sink. Errors mean the leg is already closed.
pub async fn close_leg<K>(sink: &mut K, frame: Option<CloseReason>)
where
    K: Sink<Frame> + Unpin,
{
    let _ = sink.send(Frame::Close(frame)).await;
    let _ = sink.close().await;
}

/// Time of the last relayed data frame.
#[derive(Debug)]
pub struct Activity {
    start: Instant,
    last_ms: AtomicU64,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    pub fn touch(&self) {
        let elapsed = self.start.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    /// Resolve once no data frame was seen for `limit`. Never resolves for `None`.
    pub async fn idle(&self, limit: Option<Duration>) {
        let Some(limit) = limit else {
            return future::pending().await;
        };
        loop {
            let last = self.start + Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
            let deadline = last + limit;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Both legs of an established relay.
pub struct RelayPair<C, U> {
    client: C,
    upstream: U,
    machine: StateMachine,
}

impl<C, U> RelayPair<C, U> {
    pub fn new(client: C, upstream: U, machine: StateMachine) -> Self {
        Self {
            client,
            upstream,
            machine,
        }
    }

    /// Relay until one side stops, then close both legs.
    pub async fn run<CM, UM, CE, UE>(
        self,
        idle: Option<Duration>,
        shutdown: &mut ShutdownSignal,
    ) -> Termination
    where
        C: Sink<CM, Error = CE> + Stream<Item = Result<CM, CE>> + Unpin,
        U: Sink<UM, Error = UE> + Stream<Item = Result<UM, UE>> + Unpin,
        CM: From<Frame> + Unpin,
        UM: From<Frame> + Unpin,
        Frame: From<CM> + From<UM>,
        CE: Display,
        UE: Display,
    {
        let RelayPair {
            client,
            upstream,
            mut machine,
        } = self;
        machine.advance(RelayState::Relaying);

        let (mut client_tx, mut client_rx) = adapt(client);
        let (mut upstream_tx, mut upstream_rx) = adapt(upstream);
        let activity = Activity::new();

        let termination = tokio::select! {
            t = pump(&mut client_rx, &mut upstream_tx, Side::Client, &activity) => t,
            t = pump(&mut upstream_rx, &mut client_tx, Side::Upstream, &activity) => t,
            _ = activity.idle(idle) => Termination::Idle,
            _ = shutdown.recv() => Termination::Shutdown,
        };

        machine.advance(RelayState::Closing);
        let frame = termination.close_frame();
        // The peer of the leg that stopped hears about it first.
        match termination.side() {
            Some(Side::Upstream) => {
                close_leg(&mut client_tx, frame.clone()).await;
                close_leg(&mut upstream_tx, frame).await;
            }
            _ => {
                close_leg(&mut upstream_tx, frame.clone()).await;
                close_leg(&mut client_tx, frame).await;
            }
        }
        machine.advance(RelayState::Closed);

        termination
    }
}
