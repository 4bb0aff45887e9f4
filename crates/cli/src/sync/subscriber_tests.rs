// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::sync::test_helpers::{doc, MockBackend};
use serde_json::json;
use ConnectionStatus::{Connected, Disconnected, Reconnecting};

fn setup(
    initial: ConnectionStatus,
) -> (
    MockBackend,
    StatePublisher<ConnectionStatus>,
    LiveCollectionSubscriber<MockBackend>,
) {
    let backend = MockBackend::reachable();
    let status = StatePublisher::new(initial);
    let subscriber = LiveCollectionSubscriber::new(
        SubscriberConfig::default(),
        Arc::new(backend.clone()),
        Arc::new(status.clone()),
    );
    (backend, status, subscriber)
}

async fn next(sub: &mut LiveSubscription) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(600), sub.next_snapshot())
        .await
        .expect("timed out waiting for snapshot")
        .expect("subscription ended")
}

fn scores(snapshot: &Snapshot) -> Vec<i64> {
    snapshot
        .documents
        .iter()
        .filter_map(|d| d.data["score"].as_i64())
        .collect()
}

#[test]
fn test_subscriber_config_default() {
    let config = SubscriberConfig::default();
    assert_eq!(config.resubscribe_delay, Duration::from_secs(2));
    assert_eq!(config.listen_timeout, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_first_snapshot_reflects_current_state() {
    let (backend, _status, subscriber) = setup(Connected);
    backend.set_documents(
        "leaderboard/event1",
        vec![doc("leaderboard/event1/alice", json!({ "score": 10 }))],
    );

    let mut sub = subscriber
        .subscribe(Query::collection("leaderboard/event1"))
        .unwrap();
    let snapshot = next(&mut sub).await;

    assert_eq!(scores(&snapshot), vec![10]);
    assert!(!snapshot.from_cache);
    assert_eq!(sub.latest(), Some(snapshot));
    assert!(sub.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_pushes_every_change() {
    let (backend, _status, subscriber) = setup(Connected);
    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();
    assert!(next(&mut sub).await.is_empty());

    backend.set_documents("feed", vec![doc("feed/1", json!({ "score": 1 }))]);
    backend.set_documents(
        "feed",
        vec![
            doc("feed/1", json!({ "score": 1 })),
            doc("feed/2", json!({ "score": 2 })),
        ],
    );

    assert_eq!(scores(&next(&mut sub).await), vec![1]);
    assert_eq!(scores(&next(&mut sub).await), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_connection_before_listening() {
    let (backend, status, subscriber) = setup(Disconnected);
    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.listen_calls(), 0);
    assert!(sub.latest().is_none());

    status.publish(Reconnecting);
    status.publish(Connected);
    next(&mut sub).await;
    assert_eq!(backend.listen_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resumes_after_outage_without_error() {
    let (backend, status, subscriber) = setup(Connected);
    backend.set_documents(
        "leaderboard/event1",
        vec![doc("leaderboard/event1/alice", json!({ "score": 10 }))],
    );
    let mut sub = subscriber
        .subscribe(Query::collection("leaderboard/event1"))
        .unwrap();
    assert_eq!(scores(&next(&mut sub).await), vec![10]);

    // Ten seconds offline; the server changes meanwhile
    status.publish(Disconnected);
    backend.set_reachable(false);
    tokio::time::sleep(Duration::from_secs(5)).await;
    backend.set_documents(
        "leaderboard/event1",
        vec![
            doc("leaderboard/event1/alice", json!({ "score": 10 })),
            doc("leaderboard/event1/bob", json!({ "score": 25 })),
        ],
    );
    tokio::time::sleep(Duration::from_secs(5)).await;

    backend.set_reachable(true);
    status.publish(Reconnecting);
    status.publish(Connected);

    let fresh = next(&mut sub).await;
    assert_eq!(scores(&fresh), vec![10, 25]);
    assert!(!fresh.from_cache);
    assert!(sub.errors.try_next().is_none());
    assert!(sub.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_relistens_when_feed_drops_while_connected() {
    let (backend, _status, subscriber) = setup(Connected);
    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();
    next(&mut sub).await;

    backend.drop_feeds();
    backend.set_documents("feed", vec![doc("feed/1", json!({ "score": 7 }))]);

    assert_eq!(scores(&next(&mut sub).await), vec![7]);
    assert_eq!(backend.listen_calls(), 2);
    assert!(sub.errors.try_next().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hung_listen_times_out_and_listens_again() {
    let (backend, _status, subscriber) = setup(Connected);
    backend.set_documents("feed", vec![doc("feed/1", json!({ "score": 1 }))]);
    backend.delay_next_listen(Duration::from_secs(3600));

    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();
    let snapshot = next(&mut sub).await;

    assert_eq!(scores(&snapshot), vec![1]);
    assert_eq!(backend.listen_calls(), 2);
    assert!(sub.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_query_error_is_delivered_once() {
    let (backend, status, subscriber) = setup(Connected);
    backend.set_query_error("private/admins", "permission denied");

    let mut sub = subscriber
        .subscribe(Query::collection("private/admins"))
        .unwrap();
    let error = sub.next_error().await.unwrap();
    assert_eq!(error, BackendError::Query("permission denied".into()));

    // No automatic retry, even across a reconnect
    status.publish(Disconnected);
    status.publish(Connected);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(sub.next_error().await, None);
    assert_eq!(sub.next_snapshot().await, None);
    assert_eq!(backend.listen_calls(), 1);
    assert!(!sub.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_subscribing_again_retries_a_failed_query() {
    let (backend, _status, subscriber) = setup(Connected);
    backend.set_query_error("private/admins", "permission denied");
    let mut sub = subscriber
        .subscribe(Query::collection("private/admins"))
        .unwrap();
    sub.next_error().await.unwrap();

    backend.clear_query_error("private/admins");
    backend.set_documents("private/admins", vec![doc("private/admins/root", json!({}))]);

    let mut retry = subscriber
        .subscribe(Query::collection("private/admins"))
        .unwrap();
    assert_eq!(next(&mut retry).await.len(), 1);
    assert!(retry.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_emission() {
    let (backend, _status, subscriber) = setup(Connected);
    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();
    next(&mut sub).await;

    sub.unsubscribe();
    sub.unsubscribe();
    backend.set_documents("feed", vec![doc("feed/1", json!({ "score": 1 }))]);

    assert_eq!(sub.next_snapshot().await, None);
    assert!(!sub.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_releases_feed() {
    let (backend, _status, subscriber) = setup(Connected);
    let mut sub = subscriber.subscribe(Query::collection("feed")).unwrap();
    next(&mut sub).await;
    assert_eq!(backend.listener_count(), 1);

    drop(sub);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cached_snapshot_is_served_first_while_offline() {
    let (backend, status, subscriber) = setup(Connected);
    backend.set_documents("feed", vec![doc("feed/1", json!({ "score": 3 }))]);
    let query = Query::collection("feed");

    let mut first = subscriber.subscribe(query.clone()).unwrap();
    let live = next(&mut first).await;
    first.unsubscribe();
    assert_eq!(subscriber.cached(&query), Some(live.clone()));

    status.publish(Disconnected);
    let mut second = subscriber.subscribe(query).unwrap();
    let cached = next(&mut second).await;

    assert!(cached.from_cache);
    assert_eq!(cached.documents, live.documents);
    assert_eq!(cached.revision, live.revision);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_query_is_rejected() {
    let (_backend, _status, subscriber) = setup(Connected);
    assert!(subscriber.subscribe(Query::collection("")).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_next_event_merges_snapshots_and_errors() {
    let (backend, _status, subscriber) = setup(Connected);
    let mut ok = subscriber.subscribe(Query::collection("feed")).unwrap();
    assert!(matches!(ok.next_event().await, Some(LiveEvent::Snapshot(_))));

    backend.set_query_error("secret", "permission denied");
    let mut failing = subscriber.subscribe(Query::collection("secret")).unwrap();
    assert_eq!(
        failing.next_event().await,
        Some(LiveEvent::Error(BackendError::Query("permission denied".into())))
    );
    assert_eq!(failing.next_event().await, None);
}
