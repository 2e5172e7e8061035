// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Stream Listener
//!
//! Owns the WebSocket connection to the realtime feed and turns it into a
//! stream of [`StreamEvent`]s for the view.
//!
//! ## Connection state machine
//!
//! ```text
//!                 ┌──────────── retry (backoff) ───────────┐
//!                 ▼                                        │
//! Disconnected ─▶ Connecting ─▶ Connected ─▶ Disconnected ─┤ remote close
//!                     │              │                     │
//!                     └──────────────┴──────▶ Error ───────┘ connect/transport failure
//! ```
//!
//! Every transition is emitted as `StreamEvent::State`. Whether the loop
//! goes round again is decided by the [`ReconnectPolicy`]; with the default
//! policy a failed or closed session stays that way. A session closed
//! before [`STABLE_SESSION`] has elapsed counts as a failed attempt, so a
//! server that accepts and immediately hangs up is still bounded by the
//! policy.
//!
//! ## Frames
//!
//! Text frames go through the [`BlockDecoder`]. Decoded blocks are sent as
//! `StreamEvent::Block`; frames that fail to decode become
//! `StreamEvent::Rejected` and the session carries on. Binary frames are
//! rejected the same way. Pings are answered by tungstenite while reading.
//!
//! ## Backpressure
//!
//! The event channel is bounded. When the view stops draining it, the
//! listener stops reading from the socket.

use std::borrow::Cow;

use futures::{SinkExt, Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::block::{Block, BlockDecoder, DecodeError};
use crate::config::{ExplorerConfig, ReconnectPolicy, CONNECTION_ERROR_MESSAGE, STABLE_SESSION};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Where the listener is in its connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Carries the message shown to the user.
    Error(String),
}

impl ConnectionState {
    /// Numeric code for gauges: 0 disconnected, 1 connecting, 2 connected,
    /// 3 error.
    pub fn code(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Error(_) => 3,
        }
    }
}

/// What the listener tells the view.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    State(ConnectionState),
    Block(Block),
    Rejected(DecodeError),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] WsError),

    /// Nobody is listening for events any more.
    #[error("event receiver dropped")]
    ReceiverClosed,
}

/// Why a connected session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// We were asked to shut down.
    Shutdown,
    /// The server closed the connection or the stream ended.
    RemoteClosed,
}

// ---------------------------------------------------------------------------
// StreamListener
// ---------------------------------------------------------------------------

/// Builder for the listener task.
#[derive(Debug, Clone)]
pub struct StreamListener {
    endpoint: String,
    decoder: BlockDecoder,
    reconnect: ReconnectPolicy,
    channel_capacity: usize,
}

impl StreamListener {
    pub fn new(config: &ExplorerConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            decoder: BlockDecoder::new(config.timestamp_unit),
            reconnect: config.reconnect.clone(),
            channel_capacity: config.event_channel_capacity.max(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Starts the listener on the current runtime.
    ///
    /// The receiver yields events until the listener stops, either because
    /// the reconnect policy gave up or because the handle was shut down.
    pub fn spawn(self) -> (ListenerHandle, mpsc::Receiver<StreamEvent>) {
        let (events_tx, events_rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            match self.run(events_tx, shutdown_rx).await {
                Ok(()) | Err(ListenerError::ReceiverClosed) => {}
                Err(e) => warn!(error = %e, "stream listener stopped with error"),
            }
        });

        (
            ListenerHandle {
                shutdown: shutdown_tx,
                task,
            },
            events_rx,
        )
    }

    async fn run(
        self,
        events: mpsc::Sender<StreamEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ListenerError> {
        match self.connect_loop(&events, &mut shutdown).await? {
            LoopExit::Shutdown => {
                // The view may have stopped draining; never wait for room here.
                if events
                    .try_send(StreamEvent::State(ConnectionState::Disconnected))
                    .is_err()
                {
                    debug!("final state event dropped, event channel full or closed");
                }
                info!("stream listener shut down");
            }
            LoopExit::RetriesExhausted => {}
        }
        Ok(())
    }

    async fn connect_loop(
        &self,
        events: &mpsc::Sender<StreamEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<LoopExit, ListenerError> {
        let mut failures: u32 = 0;

        loop {
            if !emit(events, shutdown, StreamEvent::State(ConnectionState::Connecting)).await? {
                return Ok(LoopExit::Shutdown);
            }
            info!(endpoint = %self.endpoint, attempt = failures + 1, "connecting to realtime feed");

            let connected = tokio::select! {
                res = connect_async(self.endpoint.as_str()) => res,
                _ = shutdown.changed() => return Ok(LoopExit::Shutdown),
            };

            let outcome = match connected {
                Ok((socket, _response)) => {
                    info!(endpoint = %self.endpoint, "websocket client connected");
                    let connected_at = Instant::now();
                    let (mut sink, stream) = socket.split();

                    let connected_event = StreamEvent::State(ConnectionState::Connected);
                    let end = if emit(events, shutdown, connected_event).await? {
                        pump_frames(stream, &self.decoder, events, shutdown).await
                    } else {
                        Ok(SessionEnd::Shutdown)
                    };

                    // Short sessions count as failed attempts.
                    if connected_at.elapsed() >= STABLE_SESSION {
                        failures = 0;
                    }

                    match end {
                        Ok(SessionEnd::Shutdown) => {
                            let close = Message::Close(Some(CloseFrame {
                                code: CloseCode::Normal,
                                reason: Cow::from("client closed"),
                            }));
                            if let Err(e) = sink.send(close).await {
                                debug!(error = %e, "close frame not delivered");
                            }
                            return Ok(LoopExit::Shutdown);
                        }
                        Ok(SessionEnd::RemoteClosed) => {
                            info!(endpoint = %self.endpoint, "realtime feed closed the connection");
                            StreamEvent::State(ConnectionState::Disconnected)
                        }
                        Err(ListenerError::ReceiverClosed) => return Err(ListenerError::ReceiverClosed),
                        Err(e) => {
                            error!(error = %e, "websocket connection error");
                            connection_error()
                        }
                    }
                }
                Err(e) => {
                    error!(endpoint = %self.endpoint, error = %e, "websocket connection error");
                    connection_error()
                }
            };
            if !emit(events, shutdown, outcome).await? {
                return Ok(LoopExit::Shutdown);
            }

            failures += 1;
            if !self.reconnect.allows_retry(failures) {
                debug!(failures, "reconnect policy exhausted, listener stopping");
                return Ok(LoopExit::RetriesExhausted);
            }

            let delay = self.reconnect.backoff_for(failures);
            info!(delay_ms = delay.as_millis() as u64, failures, "reconnecting after backoff");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return Ok(LoopExit::Shutdown),
            }
        }
    }
}

/// How the connect loop ended.
enum LoopExit {
    Shutdown,
    RetriesExhausted,
}

fn connection_error() -> StreamEvent {
    StreamEvent::State(ConnectionState::Error(CONNECTION_ERROR_MESSAGE.to_string()))
}

/// Sends `event` unless shutdown is requested first. Returns `Ok(false)`
/// on shutdown, so a full channel never holds up `ListenerHandle::shutdown`.
async fn emit(
    events: &mpsc::Sender<StreamEvent>,
    shutdown: &mut watch::Receiver<bool>,
    event: StreamEvent,
) -> Result<bool, ListenerError> {
    if *shutdown.borrow() {
        return Ok(false);
    }
    tokio::select! {
        biased;
        sent = events.send(event) => sent
            .map(|()| true)
            .map_err(|_| ListenerError::ReceiverClosed),
        _ = shutdown.changed() => Ok(false),
    }
}

/// Drives one connected session: reads frames until the server closes,
/// the transport fails, or `shutdown` fires.
pub async fn pump_frames<S>(
    mut stream: S,
    decoder: &BlockDecoder,
    events: &mpsc::Sender<StreamEvent>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, ListenerError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        if *shutdown.borrow() {
            return Ok(SessionEnd::Shutdown);
        }
        let frame = tokio::select! {
            _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
            frame = stream.next() => frame,
        };

        let event = match frame {
            Some(Ok(Message::Text(text))) => match decoder.decode(&text) {
                Ok(block) => {
                    debug!(index = block.index, txs = block.transaction_count(), "block received");
                    StreamEvent::Block(block)
                }
                Err(e) => {
                    warn!(error = %e, "dropping malformed block payload");
                    StreamEvent::Rejected(e)
                }
            },
            Some(Ok(Message::Binary(_))) => {
                warn!("dropping binary frame");
                StreamEvent::Rejected(DecodeError::UnexpectedFrame("binary"))
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "close frame received");
                return Ok(SessionEnd::RemoteClosed);
            }
            // Ping/pong and raw frames need no action here.
            Some(Ok(_)) => continue,
            Some(Err(WsError::ConnectionClosed)) | None => return Ok(SessionEnd::RemoteClosed),
            Some(Err(e)) => return Err(e.into()),
        };

        if !emit(events, shutdown, event).await? {
            return Ok(SessionEnd::Shutdown);
        }
    }
}

// ---------------------------------------------------------------------------
// ListenerHandle
// ---------------------------------------------------------------------------

/// Control side of a running listener.
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Closes the connection (normal close frame) and waits for the task.
    ///
    /// Does not depend on the event receiver being drained: a listener
    /// blocked on a full channel gives up the pending event and stops.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "stream listener task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
