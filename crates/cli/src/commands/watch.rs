// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Follow a remote collection live.

use std::sync::Arc;

use tokio::sync::watch;
use tt_core::{Query, Snapshot};

use super::runtime;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sync::{ConnectivityMonitor, LiveCollectionSubscriber, LiveEvent, WebSocketBackend};

pub fn run(
    config: &Config,
    collection: &str,
    limit: Option<usize>,
    order_by: Option<String>,
    descending: bool,
) -> Result<()> {
    let query = build_query(collection, limit, order_by, descending);
    query.validate()?;
    runtime()?.block_on(run_async(config, query))
}

pub(crate) fn build_query(
    collection: &str,
    limit: Option<usize>,
    order_by: Option<String>,
    descending: bool,
) -> Query {
    let mut query = Query::collection(collection);
    if let Some(field) = order_by {
        query = query.order_by(field, descending);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    query
}

async fn run_async(config: &Config, query: Query) -> Result<()> {
    let backend = Arc::new(WebSocketBackend::new(config.remote.url.clone()));
    let (_reachability_tx, reachability) = watch::channel(true);
    let monitor =
        ConnectivityMonitor::spawn(config.monitor_config(), Arc::clone(&backend), reachability);

    let subscriber =
        LiveCollectionSubscriber::new(config.subscriber_config(), backend, Arc::new(monitor));
    let mut subscription = subscriber.subscribe(query)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = subscription.next_event() => match event {
                Some(LiveEvent::Snapshot(snapshot)) => println!("{}", format_snapshot(&snapshot)?),
                Some(LiveEvent::Error(error)) => return Err(Error::Backend(error)),
                None => break,
            },
        }
    }

    subscription.unsubscribe();
    Ok(())
}

pub(crate) fn format_snapshot(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string(snapshot)?)
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
