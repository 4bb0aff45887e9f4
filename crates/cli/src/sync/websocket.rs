// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket backend implementation using tokio-tungstenite.
//!
//! Pings and writes share one lazily opened request connection, serialized
//! by an async mutex and matched to replies by id. Each listen opens its own
//! connection whose frames are forwarded into the snapshot feed by a
//! background task.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tt_core::protocol::{ClientMessage, ServerMessage};
use tt_core::{PendingOperation, Query};

use super::backend::{Backend, BackendError, BackendFuture, BackendResult, SnapshotFeed};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of each snapshot feed channel.
const FEED_CAPACITY: usize = 16;

/// Backend speaking the tether JSON protocol over WebSocket.
pub struct WebSocketBackend {
    url: String,
    /// Shared connection for pings and writes, if open.
    request: Mutex<Option<WebSocketConnection>>,
    next_id: AtomicU64,
}

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl WebSocketConnection {
    async fn open(url: &str) -> BackendResult<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        let (sink, stream) = ws_stream.split();
        Ok(WebSocketConnection { sink, stream })
    }

    async fn send(&mut self, msg: &ClientMessage) -> BackendResult<()> {
        let json = msg
            .to_json()
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))?;

        // Flush so a broken connection is detected here rather than on recv
        self.sink
            .flush()
            .await
            .map_err(|e| BackendError::Unreachable(e.to_string()))
    }

    /// Receive the next protocol message.
    ///
    /// Returns `None` if the connection is closed.
    async fn recv(&mut self) -> BackendResult<Option<ServerMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = ServerMessage::from_json(&text)
                        .map_err(|e| BackendError::Unavailable(e.to_string()))?;
                    return Ok(Some(msg));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(BackendError::Unreachable(e.to_string())),
            }
        }
    }

    /// Send a request and wait for the reply carrying the same id.
    async fn exchange(&mut self, msg: &ClientMessage, id: u64) -> BackendResult<ServerMessage> {
        self.send(msg).await?;
        loop {
            match self.recv().await? {
                Some(reply) if reply.reply_to() == Some(id) => return Ok(reply),
                Some(_) => continue,
                None => {
                    return Err(BackendError::Unreachable("connection closed".to_string()));
                }
            }
        }
    }
}

impl WebSocketBackend {
    /// Create a backend for the given `ws://` or `wss://` URL.
    ///
    /// No connection is opened until the first request.
    pub fn new(url: impl Into<String>) -> Self {
        WebSocketBackend {
            url: url.into(),
            request: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, msg: ClientMessage, id: u64) -> BackendResult<ServerMessage> {
        let mut guard = self.request.lock().await;
        if guard.is_none() {
            *guard = Some(WebSocketConnection::open(&self.url).await?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(BackendError::Unreachable("no connection".to_string()));
        };

        let result = conn.exchange(&msg, id).await;
        if matches!(&result, Err(e) if e.is_connectivity()) {
            // Connection is broken, reopen on the next request
            *guard = None;
        }
        result
    }
}

impl Backend for WebSocketBackend {
    fn ping(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let id = self.next_id();
            match self.request(ClientMessage::ping(id), id).await? {
                ServerMessage::Pong { .. } => Ok(()),
                other => Err(unexpected(&other)),
            }
        })
    }

    fn apply<'a>(&'a self, op: &'a PendingOperation) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let id = self.next_id();
            match self.request(ClientMessage::write(id, op.clone()), id).await? {
                ServerMessage::Ack { .. } => Ok(()),
                ServerMessage::Rejected { reason, .. } => Err(BackendError::Rejected(reason)),
                ServerMessage::Error { message, .. } => Err(BackendError::Unavailable(message)),
                other => Err(unexpected(&other)),
            }
        })
    }

    fn listen<'a>(&'a self, query: &'a Query) -> BackendFuture<'a, SnapshotFeed> {
        Box::pin(async move {
            let mut conn = WebSocketConnection::open(&self.url).await?;
            conn.send(&ClientMessage::listen(query.clone())).await?;

            let (tx, rx) = mpsc::channel(FEED_CAPACITY);
            tokio::spawn(forward_feed(conn, tx));
            Ok(rx)
        })
    }
}

/// Forward listen frames into the feed until either side goes away.
async fn forward_feed(
    mut conn: WebSocketConnection,
    tx: mpsc::Sender<BackendResult<tt_core::Snapshot>>,
) {
    loop {
        let msg = tokio::select! {
            _ = tx.closed() => break,
            msg = conn.recv() => msg,
        };

        match msg {
            Ok(Some(ServerMessage::Snapshot { snapshot })) => {
                if tx.send(Ok(snapshot)).await.is_err() {
                    break;
                }
            }
            Ok(Some(ServerMessage::QueryError { message })) => {
                let _ = tx.send(Err(BackendError::Query(message))).await;
                break;
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                break;
            }
        }
    }

    let _ = conn.sink.close().await;
}

fn unexpected(msg: &ServerMessage) -> BackendError {
    BackendError::Unavailable(format!("unexpected reply: {:?}", msg))
}

#[cfg(test)]
#[path = "websocket_tests.rs"]
mod tests;
