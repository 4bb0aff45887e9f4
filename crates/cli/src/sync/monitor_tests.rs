// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the connectivity monitor.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::sync::test_helpers::{drain, wait_for, MockBackend};
use ConnectionStatus::{Connected, Disconnected, Reconnecting};

fn test_config() -> MonitorConfig {
    MonitorConfig {
        grace: Duration::from_secs(3),
        probe_timeout: Duration::from_secs(1),
        probe_interval: Duration::from_secs(2),
        heartbeat_interval: Some(Duration::from_secs(10)),
    }
}

fn spawn(
    backend: &MockBackend,
    online: bool,
) -> (ConnectivityMonitor, watch::Sender<bool>, Subscription<ConnectionStatus>) {
    let (tx, rx) = watch::channel(online);
    let monitor = ConnectivityMonitor::spawn(test_config(), Arc::new(backend.clone()), rx);
    let sub = monitor.observe();
    (monitor, tx, sub)
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[test]
fn test_monitor_config_default() {
    let config = MonitorConfig::default();
    assert_eq!(config.grace, Duration::from_secs(3));
    assert_eq!(config.probe_timeout, Duration::from_secs(5));
    assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(15)));
}

#[tokio::test(start_paused = true)]
async fn test_gain_reports_reconnecting_then_connected() {
    let backend = MockBackend::reachable();
    let (_monitor, tx, mut sub) = spawn(&backend, false);

    assert_eq!(sub.next().await, Some(Disconnected));

    tx.send(true).unwrap();
    assert_eq!(sub.next().await, Some(Reconnecting));
    assert_eq!(sub.next().await, Some(Connected));
}

#[tokio::test(start_paused = true)]
async fn test_late_observer_gets_current_reading() {
    let backend = MockBackend::reachable();
    let (monitor, _tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    let mut late = monitor.observe();
    assert_eq!(late.next().await, Some(Connected));
    assert_eq!(monitor.current(), Connected);
}

#[tokio::test(start_paused = true)]
async fn test_short_flap_is_debounced() {
    let backend = MockBackend::reachable();
    let (_monitor, tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    tx.send(false).unwrap();
    sleep_secs(1).await;
    tx.send(true).unwrap();
    sleep_secs(30).await;

    assert!(drain(&mut sub).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_loss_past_grace_reports_disconnected() {
    let backend = MockBackend::reachable();
    let (monitor, tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    let lost_at = Instant::now();
    tx.send(false).unwrap();
    assert_eq!(sub.next().await, Some(Disconnected));
    assert!(lost_at.elapsed() >= Duration::from_secs(3));
    assert_eq!(monitor.current(), Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probes_stay_reconnecting_until_backend_answers() {
    let backend = MockBackend::default();
    let (monitor, _tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Reconnecting).await;

    sleep_secs(10).await;
    assert_eq!(monitor.current(), Reconnecting);
    assert!(backend.pings() >= 2);

    backend.set_reachable(true);
    wait_for(&mut sub, |s| *s == Connected).await;
}

#[tokio::test(start_paused = true)]
async fn test_probe_timeout_keeps_reconnecting_and_retries() {
    let backend = MockBackend::reachable();
    backend.set_ping_delay(Duration::from_secs(60));
    let (monitor, _tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Reconnecting).await;

    sleep_secs(10).await;
    assert_eq!(monitor.current(), Reconnecting);
    // 1s timeout + 2s interval per attempt
    assert!(backend.pings() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_failure_disconnects_after_grace() {
    let backend = MockBackend::reachable();
    let (_monitor, _tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    backend.set_reachable(false);
    assert_eq!(sub.next().await, Some(Disconnected));
    // Raw signal is still up, so the monitor starts reconnecting at once
    assert_eq!(sub.next().await, Some(Reconnecting));

    backend.set_reachable(true);
    assert_eq!(sub.next().await, Some(Connected));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_blip_within_grace_is_ignored() {
    let backend = MockBackend::reachable();
    let (_monitor, _tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    // Offline across the next heartbeat only
    sleep_secs(9).await;
    backend.set_reachable(false);
    sleep_secs(2).await;
    backend.set_reachable(true);
    sleep_secs(30).await;

    assert!(drain(&mut sub).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_never_skips_reconnecting() {
    let backend = MockBackend::reachable();
    let (_monitor, tx, mut sub) = spawn(&backend, false);

    for (online, secs) in [
        (true, 1),
        (false, 5),
        (true, 1),
        (false, 1),
        (true, 4),
        (false, 10),
        (true, 2),
    ] {
        tx.send(online).unwrap();
        sleep_secs(secs).await;
    }

    let seen = drain(&mut sub);
    assert!(seen.contains(&Connected));
    for pair in seen.windows(2) {
        assert!(
            !(pair[0] == Disconnected && pair[1] == Connected),
            "skipped reconnecting: {:?}",
            seen
        );
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_publishes_disconnected() {
    let backend = MockBackend::reachable();
    let (monitor, tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;

    monitor.stop();
    assert!(monitor.is_stopped());
    assert_eq!(sub.next().await, Some(Disconnected));

    tx.send(false).unwrap();
    tx.send(true).unwrap();
    sleep_secs(30).await;
    assert!(drain(&mut sub).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_signal_falls_back_to_heartbeats() {
    let backend = MockBackend::reachable();
    let (_monitor, tx, mut sub) = spawn(&backend, true);
    wait_for(&mut sub, |s| *s == Connected).await;
    drop(tx);

    backend.set_reachable(false);
    wait_for(&mut sub, |s| *s == Disconnected).await;
}
