// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prometheus Metrics
//!
//! Exposes operational metrics for a `watch` session. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use quantumfuse_explorer::{ExplorerView, ViewUpdate};

/// Holds all Prometheus metric handles for the explorer.
#[derive(Clone)]
pub struct ExplorerMetrics {
    registry: Registry,
    /// Blocks decoded and added to the block list.
    pub blocks_received_total: IntCounter,
    /// Frames that failed to decode.
    pub decode_errors_total: IntCounter,
    /// Connection attempts, including the first.
    pub connection_attempts_total: IntCounter,
    /// Blocks currently held in the block list.
    pub retained_blocks: IntGauge,
    /// Blocks matching the current search term.
    pub filtered_blocks: IntGauge,
    /// 0 disconnected, 1 connecting, 2 connected, 3 error.
    pub connection_state: IntGauge,
}

impl ExplorerMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("qfx".into()), None)?;

        let blocks_received_total = IntCounter::new(
            "blocks_received_total",
            "Total number of blocks received from the realtime feed",
        )?;
        registry.register(Box::new(blocks_received_total.clone()))?;

        let decode_errors_total = IntCounter::new(
            "decode_errors_total",
            "Total number of frames that could not be decoded as blocks",
        )?;
        registry.register(Box::new(decode_errors_total.clone()))?;

        let connection_attempts_total = IntCounter::new(
            "connection_attempts_total",
            "Total number of connection attempts to the realtime feed",
        )?;
        registry.register(Box::new(connection_attempts_total.clone()))?;

        let retained_blocks =
            IntGauge::new("retained_blocks", "Number of blocks held in the block list")?;
        registry.register(Box::new(retained_blocks.clone()))?;

        let filtered_blocks = IntGauge::new(
            "filtered_blocks",
            "Number of blocks matching the current search term",
        )?;
        registry.register(Box::new(filtered_blocks.clone()))?;

        let connection_state = IntGauge::new(
            "connection_state",
            "Connection state (0 disconnected, 1 connecting, 2 connected, 3 error)",
        )?;
        registry.register(Box::new(connection_state.clone()))?;

        Ok(Self {
            registry,
            blocks_received_total,
            decode_errors_total,
            connection_attempts_total,
            retained_blocks,
            filtered_blocks,
            connection_state,
        })
    }

    /// Records the effect of one applied listener event.
    pub fn record(&self, update: ViewUpdate, view: &ExplorerView) {
        match update {
            ViewUpdate::BlockAdded { .. } => self.blocks_received_total.inc(),
            ViewUpdate::Rejected => self.decode_errors_total.inc(),
            ViewUpdate::StateChanged => {
                let state = view.connection_state();
                if *state == quantumfuse_explorer::ConnectionState::Connecting {
                    self.connection_attempts_total.inc();
                }
                self.connection_state.set(state.code());
            }
        }
        self.observe(view);
    }

    /// Refreshes the gauges derived from the block list and search term.
    pub fn observe(&self, view: &ExplorerView) {
        self.retained_blocks.set(view.blocks().len() as i64);
        self.filtered_blocks.set(view.filtered().len() as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<ExplorerMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Router serving `/metrics`.
pub fn metrics_router(metrics: SharedMetrics) -> axum::Router {
    axum::Router::new()
        .route("/metrics", axum::routing::get(metrics_handler))
        .with_state(metrics)
}
