//! End-to-end tests for the stream listener against the demo feed.
//!
//! Each test binds its own feed on an ephemeral port, points a listener at
//! it and drives an [`ExplorerView`] from the resulting events, the same
//! way the CLI event loop does. Every wait is bounded by a timeout so a
//! broken connection fails the test instead of hanging it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use quantumfuse_explorer::config::CONNECTION_ERROR_MESSAGE;
use quantumfuse_explorer::{
    Block, ConnectionState, DecodeError, ExplorerConfig, ExplorerView, FeedConfig, FeedServer,
    ReconnectPolicy, StreamEvent, StreamListener, TimestampUnit, Transaction, ViewStatus,
};

const WAIT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Starts a feed that never generates blocks on its own.
async fn quiet_feed(unit: TimestampUnit) -> FeedServer {
    let config = FeedConfig {
        block_interval: Duration::from_secs(3_600),
        timestamp_unit: unit,
        seed: Some(1),
        ..FeedConfig::default()
    };
    FeedServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config)
        .await
        .expect("bind feed")
}

fn config_for(endpoint: String, unit: TimestampUnit) -> ExplorerConfig {
    ExplorerConfig {
        endpoint,
        timestamp_unit: unit,
        ..ExplorerConfig::default()
    }
}

/// An endpoint nothing is listening on.
async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{addr}/v2/realtime")
}

fn block(index: i64, secs: i64, txs: &[(&str, &str, f64)]) -> Block {
    Block::new(
        index,
        DateTime::from_timestamp(secs, 0).unwrap(),
        txs.iter()
            .map(|(s, r, a)| Transaction::new(*s, *r, *a))
            .collect(),
    )
}

async fn next_event(rx: &mut mpsc::Receiver<StreamEvent>) -> Option<StreamEvent> {
    timeout(WAIT, rx.recv()).await.expect("timed out waiting for event")
}

/// Applies events to `view` until `done` holds.
async fn pump_until<F>(view: &mut ExplorerView, rx: &mut mpsc::Receiver<StreamEvent>, done: F)
where
    F: Fn(&ExplorerView) -> bool,
{
    while !done(view) {
        let event = next_event(rx).await.expect("listener stopped early");
        view.apply(event);
    }
}

/// A server that completes every handshake and closes straight away.
/// Returns its endpoint and a counter of accepted connections.
async fn hang_up_server() -> (String, Arc<AtomicUsize>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(tcp).await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = ws.close(None).await;
                while let Some(Ok(_)) = ws.next().await {}
            });
        }
    });

    (format!("ws://{addr}/v2/realtime"), accepted)
}

/// Waits until the feed has registered `n` subscribers.
async fn wait_for_subscribers(feed: &FeedServer, n: usize) {
    timeout(WAIT, async {
        while feed.subscriber_count() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscriber never registered");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn streams_blocks_newest_first() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let config = config_for(feed.realtime_url(), TimestampUnit::Millis);
    let mut view = ExplorerView::new(&config);
    let (handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    feed.publish(&block(1, 500, &[("c", "d", 3.0)]));
    feed.publish(&block(2, 1_000, &[("a", "b", 5.0)]));
    feed.publish(&block(3, 1_500, &[]));

    pump_until(&mut view, &mut rx, |v| v.blocks().len() == 3).await;

    let order: Vec<i64> = view.blocks().iter().map(|b| b.index).collect();
    assert_eq!(order, vec![3, 2, 1]);
    assert_eq!(view.blocks().latest().unwrap().timestamp.timestamp(), 1_500);

    view.set_search_term("a");
    let filtered: Vec<i64> = view.filtered().iter().map(|b| b.index).collect();
    assert_eq!(filtered, vec![2]);

    let charts = view.charts();
    assert_eq!(charts.index_series.len(), 3);
    assert_eq!(charts.amount_series.len(), 2);

    handle.shutdown().await;
    feed.shutdown().await;
}

#[tokio::test]
async fn seconds_feed_decodes_to_the_same_instant() {
    let feed = quiet_feed(TimestampUnit::Seconds).await;
    let config = config_for(feed.realtime_url(), TimestampUnit::Seconds);
    let mut view = ExplorerView::new(&config);
    let (handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    feed.publish(&block(1, 1_700_000_000, &[]));
    pump_until(&mut view, &mut rx, |v| !v.blocks().is_empty()).await;

    assert_eq!(
        view.blocks().latest().unwrap().timestamp.timestamp(),
        1_700_000_000
    );

    handle.shutdown().await;
    feed.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_are_rejected_without_ending_the_session() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let config = config_for(feed.realtime_url(), TimestampUnit::Millis);
    let mut view = ExplorerView::new(&config);
    let (handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    feed.publish_raw("{\"index\": 1, \"timestamp\":");
    feed.publish_raw(r#"{"index":"one","timestamp":0,"transactions":[]}"#);
    feed.publish(&block(7, 0, &[]));

    pump_until(&mut view, &mut rx, |v| v.blocks().len() == 1).await;

    assert_eq!(view.rejected_count(), 2);
    assert!(matches!(view.last_rejection(), Some(DecodeError::Schema(_))));
    assert_eq!(view.status(), ViewStatus::Live);
    assert_eq!(view.blocks().latest().unwrap().index, 7);

    handle.shutdown().await;
    feed.shutdown().await;
}

#[tokio::test]
async fn refused_connection_fails_without_retry() {
    let config = ExplorerConfig {
        reconnect: ReconnectPolicy::none(),
        ..config_for(dead_endpoint().await, TimestampUnit::Millis)
    };
    let (_handle, mut rx) = StreamListener::new(&config).spawn();

    assert_eq!(
        next_event(&mut rx).await,
        Some(StreamEvent::State(ConnectionState::Connecting))
    );
    assert_eq!(
        next_event(&mut rx).await,
        Some(StreamEvent::State(ConnectionState::Error(
            CONNECTION_ERROR_MESSAGE.to_string()
        )))
    );
    // No retry: the listener is done.
    assert_eq!(next_event(&mut rx).await, None);
}

#[tokio::test]
async fn retries_follow_the_policy() {
    let config = ExplorerConfig {
        reconnect: ReconnectPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            multiplier: 2,
        },
        ..config_for(dead_endpoint().await, TimestampUnit::Millis)
    };
    let mut view = ExplorerView::new(&config);
    let (_handle, mut rx) = StreamListener::new(&config).spawn();

    let mut states = Vec::new();
    while let Some(event) = next_event(&mut rx).await {
        if let StreamEvent::State(state) = &event {
            states.push(state.clone());
        }
        view.apply(event);
    }

    let connecting = states
        .iter()
        .filter(|s| **s == ConnectionState::Connecting)
        .count();
    let errors = states
        .iter()
        .filter(|s| matches!(s, ConnectionState::Error(_)))
        .count();
    assert_eq!(connecting, 3);
    assert_eq!(errors, 3);
    assert_eq!(view.connection_attempts(), 3);
    assert!(matches!(view.status(), ViewStatus::Failed { .. }));
}

#[tokio::test]
async fn reconnects_after_remote_close_when_allowed() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let endpoint = feed.realtime_url();
    let config = ExplorerConfig {
        reconnect: ReconnectPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
            multiplier: 1,
        },
        ..config_for(endpoint, TimestampUnit::Millis)
    };
    let mut view = ExplorerView::new(&config);
    let (_handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    // The feed going away closes the session; the retry then fails.
    feed.shutdown().await;

    pump_until(&mut view, &mut rx, |v| v.connection_attempts() == 2).await;
    assert_eq!(view.status(), ViewStatus::Reconnecting);

    while let Some(event) = next_event(&mut rx).await {
        view.apply(event);
    }
    assert!(matches!(view.status(), ViewStatus::Failed { .. }));
}

#[tokio::test]
async fn remote_close_without_retry_disconnects() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let config = config_for(feed.realtime_url(), TimestampUnit::Millis);
    let mut view = ExplorerView::new(&config);
    let (_handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    feed.shutdown().await;

    while let Some(event) = next_event(&mut rx).await {
        view.apply(event);
    }
    assert_eq!(view.status(), ViewStatus::Disconnected);
    assert_eq!(view.connection_attempts(), 1);
}

#[tokio::test]
async fn shutdown_closes_the_connection() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let config = config_for(feed.realtime_url(), TimestampUnit::Millis);
    let mut view = ExplorerView::new(&config);
    let (handle, mut rx) = StreamListener::new(&config).spawn();

    pump_until(&mut view, &mut rx, |v| v.status() == ViewStatus::Live).await;
    wait_for_subscribers(&feed, 1).await;

    timeout(WAIT, handle.shutdown())
        .await
        .expect("listener did not stop");

    assert_eq!(
        next_event(&mut rx).await,
        Some(StreamEvent::State(ConnectionState::Disconnected))
    );
    assert_eq!(next_event(&mut rx).await, None);

    // The feed drops the subscriber once the close frame lands.
    timeout(WAIT, async {
        while feed.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("feed kept the subscriber");

    feed.shutdown().await;
}

#[tokio::test]
async fn generated_feed_reaches_the_view() {
    let config = FeedConfig {
        block_interval: Duration::from_millis(20),
        seed: Some(99),
        ..FeedConfig::default()
    };
    let feed = FeedServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), config)
        .await
        .expect("bind feed");
    let explorer = config_for(feed.realtime_url(), TimestampUnit::Millis);
    let mut view = ExplorerView::new(&explorer);
    let (handle, mut rx) = StreamListener::new(&explorer).spawn();

    pump_until(&mut view, &mut rx, |v| v.blocks().len() >= 3).await;

    // Generated indexes increase, so newest-first means descending.
    let order: Vec<i64> = view.blocks().iter().map(|b| b.index).collect();
    assert!(order.windows(2).all(|w| w[0] > w[1]));
    assert_eq!(view.rejected_count(), 0);

    handle.shutdown().await;
    feed.shutdown().await;
}

#[tokio::test]
async fn shutdown_does_not_wait_for_a_full_channel() {
    let feed = quiet_feed(TimestampUnit::Millis).await;
    let config = ExplorerConfig {
        event_channel_capacity: 1,
        ..config_for(feed.realtime_url(), TimestampUnit::Millis)
    };
    let (handle, mut rx) = StreamListener::new(&config).spawn();

    assert_eq!(
        next_event(&mut rx).await,
        Some(StreamEvent::State(ConnectionState::Connecting))
    );
    assert_eq!(
        next_event(&mut rx).await,
        Some(StreamEvent::State(ConnectionState::Connected))
    );
    wait_for_subscribers(&feed, 1).await;

    // One block fills the channel, the rest leave the listener waiting.
    for i in 1..=3 {
        feed.publish(&block(i, i, &[]));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The receiver is still held and never drained.
    timeout(WAIT, handle.shutdown())
        .await
        .expect("shutdown waited on the undrained receiver");

    let mut rest = Vec::new();
    while let Some(event) = next_event(&mut rx).await {
        rest.push(event);
    }
    assert!(rest.len() <= 2);
    assert!(rest.iter().all(|e| matches!(
        e,
        StreamEvent::Block(_) | StreamEvent::State(ConnectionState::Disconnected)
    )));

    feed.shutdown().await;
}

#[tokio::test]
async fn immediate_hang_ups_count_against_the_retry_budget() {
    let (endpoint, accepted) = hang_up_server().await;
    let config = ExplorerConfig {
        reconnect: ReconnectPolicy {
            max_retries: 1,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(5),
            multiplier: 1,
        },
        ..config_for(endpoint, TimestampUnit::Millis)
    };
    let (_handle, mut rx) = StreamListener::new(&config).spawn();

    let mut connecting = 0;
    while let Some(event) = next_event(&mut rx).await {
        if event == StreamEvent::State(ConnectionState::Connecting) {
            connecting += 1;
        }
    }

    // The first attempt plus one retry, then the listener gives up.
    assert_eq!(connecting, 2);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}
