// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # QuantumFuse Explorer CLI
//!
//! Entry point for the `qf-explorer` binary. Parses CLI arguments,
//! initializes logging and metrics, and runs one of three subcommands:
//!
//! - `watch`   - connect to a realtime feed and render the explorer view
//! - `feed`    - serve a synthetic realtime feed for local runs
//! - `version` - print build version information

mod cli;
mod logging;
mod metrics;
mod render;

use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use quantumfuse_explorer::config::REALTIME_PATH;
use quantumfuse_explorer::{
    ExplorerView, FeedServer, SearchDebouncer, SearchInput, StreamListener, ViewStatus,
};

use cli::{Commands, ExplorerCli, FeedArgs, OutputFormat, WatchArgs};
use metrics::ExplorerMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ExplorerCli::parse();

    match cli.command {
        Commands::Watch(args) => {
            logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);
            run_watch(args).await
        }
        Commands::Feed(args) => {
            logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);
            run_feed(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Connects to the realtime feed and renders the view after every update
/// until the listener stops or a shutdown signal arrives.
async fn run_watch(args: WatchArgs) -> Result<()> {
    let config = args.explorer_config();
    config.validate().context("invalid explorer configuration")?;

    tracing::info!(
        endpoint = %config.endpoint,
        timestamp_unit = %config.timestamp_unit,
        retained_blocks = config.retained_blocks,
        debounce_ms = config.search_debounce.as_millis() as u64,
        max_retries = config.reconnect.max_retries,
        "starting qf-explorer"
    );

    // --- Metrics ---
    let explorer_metrics =
        Arc::new(ExplorerMetrics::new().context("failed to create prometheus registry")?);
    let metrics_server = match args.metrics_port {
        Some(port) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind metrics listener on {}", addr))?;
            tracing::info!("Metrics server listening on {}", addr);

            let router = metrics::metrics_router(Arc::clone(&explorer_metrics));
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, router).await {
                    tracing::error!("Metrics server error: {}", e);
                }
            }))
        }
        None => None,
    };

    // --- View and search ---
    let mut view = ExplorerView::new(&config);
    view.set_search_term(args.search.clone());
    let (search_input, mut search_rx) =
        SearchDebouncer::spawn(config.search_debounce, args.search.clone());
    spawn_stdin_reader(search_input)?;

    // --- Listener ---
    let (handle, mut events) = StreamListener::new(&config).spawn();

    render(&view, args.format, args.max_rows)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut search_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("listener stopped");
                    break;
                };
                let update = view.apply(event);
                explorer_metrics.record(update, &view);
                render(&view, args.format, args.max_rows)?;
            }
            changed = search_rx.changed(), if search_open => {
                if changed.is_err() {
                    tracing::debug!("search input closed");
                    search_open = false;
                    continue;
                }
                let term = search_rx.borrow_and_update().clone();
                if view.set_search_term(term) {
                    tracing::debug!(term = %view.search_term(), "search term applied");
                    explorer_metrics.observe(&view);
                    render(&view, args.format, args.max_rows)?;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, closing connection");
                break;
            }
        }
    }

    // Nothing reads events past this point.
    drop(events);
    handle.shutdown().await;
    if let Some(server) = metrics_server {
        server.abort();
    }

    tracing::info!(
        received = view.blocks().total_received(),
        rejected = view.rejected_count(),
        "qf-explorer stopped"
    );

    match view.status() {
        ViewStatus::Failed { message } => Err(anyhow::anyhow!(message)),
        _ => Ok(()),
    }
}

/// Serves the synthetic feed until a shutdown signal arrives.
async fn run_feed(args: FeedArgs) -> Result<()> {
    let addr = SocketAddr::new(args.host, args.port);
    let config = args.feed_config();

    tracing::info!(
        addr = %addr,
        interval_ms = config.block_interval.as_millis() as u64,
        timestamp_unit = %config.timestamp_unit,
        participants = config.participants.len(),
        "starting demo feed"
    );

    let feed = FeedServer::bind(addr, config)
        .await
        .with_context(|| format!("failed to start feed on {}", addr))?;
    println!("{}", feed.realtime_url());

    shutdown_signal().await;
    tracing::info!("shutdown signal received, closing subscribers");
    feed.shutdown().await;
    Ok(())
}

/// Writes the current view to stdout.
fn render(view: &ExplorerView, format: OutputFormat, max_rows: usize) -> Result<()> {
    let snapshot = view.snapshot();
    let frame = match format {
        OutputFormat::Text => render::render_text(&snapshot, max_rows),
        OutputFormat::Json => {
            let mut line = render::render_json(&snapshot).context("failed to encode view")?;
            line.push('\n');
            line
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(frame.as_bytes())
        .and_then(|_| {
            if format == OutputFormat::Text {
                stdout.write_all(b"\n")?;
            }
            stdout.flush()
        })
        .context("failed to write view to stdout")
}

/// Reads search terms from stdin on a dedicated thread, one per line.
///
/// Blocking reads stay off the runtime so a pending read never holds up
/// shutdown. The thread ends at EOF or once the debouncer is gone.
fn spawn_stdin_reader(input: SearchInput) -> Result<()> {
    std::thread::Builder::new()
        .name("qfx-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if !input.update(search_term(&line)) {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

/// The search term carried by one stdin line. Only the line terminator is
/// removed; surrounding spaces are part of the term.
fn search_term(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Prints version information to stdout.
fn print_version() {
    println!("qf-explorer {}", env!("CARGO_PKG_VERSION"));
    println!("stream path {}", REALTIME_PATH);
    println!("rustc       {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
