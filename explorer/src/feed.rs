// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Demo Realtime Feed
//!
//! A small axum server that speaks the same protocol as the public
//! realtime endpoint: clients upgrade on `/v2/realtime` and receive one
//! JSON block per text frame. Blocks are synthesized on a fixed interval
//! by [`BlockGenerator`]. Used by `qf-explorer feed` for local runs and by
//! the integration tests.
//!
//! ## Endpoints
//!
//! | Method | Path           | Description                        |
//! |--------|----------------|------------------------------------|
//! | GET    | `/health`      | Liveness probe                     |
//! | GET    | `/v2/realtime` | WebSocket block stream (push-only) |

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::block::{Block, Transaction};
use crate::config::{
    TimestampUnit, DEFAULT_FEED_BLOCK_INTERVAL, DEFAULT_FEED_MAX_TRANSACTIONS,
    FEED_CHANNEL_CAPACITY, REALTIME_PATH,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Time between synthetic blocks.
    pub block_interval: Duration,
    /// Upper bound on transactions per block (inclusive, may be zero).
    pub max_transactions: usize,
    /// Unit used for the wire `timestamp` field.
    pub timestamp_unit: TimestampUnit,
    /// Addresses transactions are drawn from.
    pub participants: Vec<String>,
    /// Fixed RNG seed for reproducible feeds.
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            block_interval: DEFAULT_FEED_BLOCK_INTERVAL,
            max_transactions: DEFAULT_FEED_MAX_TRANSACTIONS,
            timestamp_unit: TimestampUnit::default(),
            participants: ["alice", "bob", "carol", "dave", "erin", "frank"]
                .iter()
                .map(|name| format!("qf1{name}"))
                .collect(),
            seed: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to bind feed listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to read feed listener address: {0}")]
    LocalAddr(std::io::Error),
}

// ---------------------------------------------------------------------------
// BlockGenerator
// ---------------------------------------------------------------------------

/// Produces sequential blocks with random transfers between participants.
#[derive(Debug)]
pub struct BlockGenerator {
    next_index: i64,
    max_transactions: usize,
    participants: Vec<String>,
    rng: StdRng,
}

impl BlockGenerator {
    pub fn new(config: &FeedConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let participants = if config.participants.is_empty() {
            FeedConfig::default().participants
        } else {
            config.participants.clone()
        };

        Self {
            next_index: 1,
            max_transactions: config.max_transactions,
            participants,
            rng,
        }
    }

    /// Index the next block will carry.
    pub fn next_index(&self) -> i64 {
        self.next_index
    }

    pub fn next_block(&mut self, timestamp: DateTime<Utc>) -> Block {
        let count = self.rng.gen_range(0..=self.max_transactions);
        let transactions = (0..count).map(|_| self.transfer()).collect();

        let block = Block::new(self.next_index, timestamp, transactions);
        self.next_index += 1;
        block
    }

    fn transfer(&mut self) -> Transaction {
        let n = self.participants.len();
        let from = self.rng.gen_range(0..n);
        // Pick a different recipient whenever there is one to pick.
        let to = if n > 1 {
            (from + self.rng.gen_range(1..n)) % n
        } else {
            from
        };
        // Two decimal places, like a wallet would show.
        let amount = (self.rng.gen_range(0.01..1_000.0_f64) * 100.0).round() / 100.0;

        Transaction::new(
            self.participants[from].clone(),
            self.participants[to].clone(),
            amount,
        )
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Shared state for feed handlers. Cheap to clone.
#[derive(Clone)]
pub struct FeedState {
    /// Serialized blocks, one per frame.
    frames: broadcast::Sender<String>,
    /// Flipped to `true` when the server shuts down.
    shutdown: watch::Receiver<bool>,
}

impl FeedState {
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        let (frames, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Self { frames, shutdown }
    }

    /// Sends a raw text frame to every connected client. Returns how many
    /// clients it reached.
    pub fn publish_raw(&self, frame: String) -> usize {
        self.frames.send(frame).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.frames.receiver_count()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    subscribers: usize,
}

/// Builds the feed router.
pub fn feed_router(state: FeedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(REALTIME_PATH, get(realtime_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /health`: liveness probe.
async fn health_handler(State(state): State<FeedState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            subscribers: state.subscriber_count(),
        }),
    )
}

/// `GET /v2/realtime`: WebSocket upgrade for the block stream.
///
/// The subscription is taken before the upgrade completes, so a client
/// that has seen the handshake succeed will receive every block published
/// after that point.
async fn realtime_handler(ws: WebSocketUpgrade, State(state): State<FeedState>) -> impl IntoResponse {
    let frames = state.frames.subscribe();
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| stream_blocks(socket, frames, shutdown))
}

/// Forwards broadcast frames to one client until it disconnects, the
/// channel closes, or the server shuts down.
async fn stream_blocks(
    mut socket: WebSocket,
    mut frames: broadcast::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("feed subscriber connected");

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(payload) => {
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("feed subscriber lagged by {} blocks", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Push-only channel; other client messages are ignored.
                    Some(Ok(_)) => {}
                }
            }
            _ = shutdown.changed() => {
                let _ = socket
                    .send(Message::Close(Some(CloseFrame {
                        code: axum::extract::ws::close_code::AWAY,
                        reason: "feed shutting down".into(),
                    })))
                    .await;
                break;
            }
        }
    }

    debug!("feed subscriber disconnected");
}

// ---------------------------------------------------------------------------
// FeedServer
// ---------------------------------------------------------------------------

/// A running feed: HTTP server plus the block generator loop.
pub struct FeedServer {
    local_addr: SocketAddr,
    state: FeedState,
    timestamp_unit: TimestampUnit,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
    generator: JoinHandle<()>,
}

impl FeedServer {
    /// Binds `addr` and starts serving. Port 0 picks a free port.
    pub async fn bind(addr: SocketAddr, config: FeedConfig) -> Result<Self, FeedError> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| FeedError::Bind { addr, source })?;
        let local_addr = listener.local_addr().map_err(FeedError::LocalAddr)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = FeedState::new(shutdown_rx);

        let router = feed_router(state.clone());
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("feed server error: {}", e);
            }
        });

        let generator = tokio::spawn(generate_blocks(state.clone(), config.clone()));

        info!(
            addr = %local_addr,
            path = REALTIME_PATH,
            interval_ms = config.block_interval.as_millis() as u64,
            "realtime feed listening"
        );

        Ok(Self {
            local_addr,
            state,
            timestamp_unit: config.timestamp_unit,
            shutdown: shutdown_tx,
            server,
            generator,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL of the block stream.
    pub fn realtime_url(&self) -> String {
        format!("ws://{}{}", self.local_addr, REALTIME_PATH)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.subscriber_count()
    }

    /// Publishes `block` alongside the generated ones.
    pub fn publish(&self, block: &Block) -> usize {
        match serde_json::to_string(&block.to_wire(self.timestamp_unit)) {
            Ok(frame) => self.state.publish_raw(frame),
            Err(e) => {
                warn!("failed to serialize block {}: {}", block.index, e);
                0
            }
        }
    }

    /// Publishes an arbitrary text frame, well-formed or not.
    pub fn publish_raw(&self, frame: impl Into<String>) -> usize {
        self.state.publish_raw(frame.into())
    }

    /// Sends a close frame to every client and stops the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        self.generator.abort();
        // Give subscriber tasks a moment to flush their close frames.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.server.abort();
        info!(addr = %self.local_addr, "realtime feed stopped");
    }
}

async fn generate_blocks(state: FeedState, config: FeedConfig) {
    let mut generator = BlockGenerator::new(&config);
    let mut interval = tokio::time::interval(config.block_interval.max(Duration::from_millis(1)));
    // The first tick completes immediately; skip it so clients get a full
    // interval to connect.
    interval.tick().await;

    loop {
        interval.tick().await;
        let block = generator.next_block(Utc::now());
        let wire = block.to_wire(config.timestamp_unit);
        match serde_json::to_string(&wire) {
            Ok(frame) => {
                let reached = state.publish_raw(frame);
                debug!(index = block.index, txs = block.transaction_count(), reached, "block published");
            }
            Err(e) => warn!("failed to serialize block {}: {}", block.index, e),
        }
    }
}
