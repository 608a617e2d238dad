// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real-time connection manager.
//!
//! One WebSocket connection per application session, connected lazily on
//! first use. Inbound `message` frames are read by a single reader task and
//! fanned out to every registered subscriber in registration order; a
//! panicking subscriber is isolated and logged. Subscription lifetime is
//! decoupled from connection lifetime: dropping the last subscription does
//! not disconnect, and disconnecting (on logout) keeps the registry intact
//! for a later reconnect.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::{dm_room, ChatMessage, WireMessage};
use crate::error::ApiError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound chat payload for direct and room messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Wire frames
// ---------------------------------------------------------------------------

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    JoinRoom {
        room: String,
        user_id: String,
    },
    JoinDmRoom {
        room: String,
        user_id: String,
    },
    DmMessage {
        to: String,
        #[serde(flatten)]
        payload: OutboundMessage,
    },
    RoomMessage {
        room: String,
        #[serde(flatten)]
        payload: OutboundMessage,
    },
}

/// Server → client events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerFrame {
    Message(WireMessage),
}

// ---------------------------------------------------------------------------
// Listener registry
// ---------------------------------------------------------------------------

type Handler = Arc<dyn Fn(&ChatMessage) + Send + Sync>;

/// Ordered registry of message subscribers. Registry mutation never touches
/// the transport; the reader task just snapshots and invokes.
struct Listeners {
    inner: Mutex<Vec<(u64, Handler)>>,
    next_id: AtomicU64,
}

impl Listeners {
    fn new() -> Self {
        Self { inner: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    fn add(&self, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().push((id, handler));
        id
    }

    fn remove(&self, id: u64) {
        self.inner.lock().retain(|(entry_id, _)| *entry_id != id);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Invoke every handler in registration order. A panicking handler is
    /// isolated so the rest still run for this event.
    fn dispatch(&self, message: &ChatMessage) {
        let handlers: Vec<Handler> =
            self.inner.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for handler in handlers {
            if std::panic::catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                warn!(message_id = %message.id, "chat subscriber panicked, continuing fan-out");
            }
        }
    }
}

/// Handle for one registered subscriber. Dropping it (or calling
/// [`Subscription::unsubscribe`]) removes exactly this handler.
pub struct Subscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Removal happens in Drop.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Connection manager
// ---------------------------------------------------------------------------

struct Conn {
    out_tx: mpsc::Sender<ClientFrame>,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

/// Shared real-time connection, multiplexed across chat surfaces.
pub struct SocketManager {
    ws_url: String,
    listeners: Arc<Listeners>,
    conn: tokio::sync::Mutex<Option<Conn>>,
}

impl SocketManager {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            listeners: Arc::new(Listeners::new()),
            conn: tokio::sync::Mutex::new(None),
        }
    }

    /// Establish the transport connection. No-op when already connected.
    pub async fn connect(&self) -> Result<(), ApiError> {
        let mut slot = self.conn.lock().await;
        self.ensure_connected(&mut slot).await
    }

    /// Tear down the transport connection. No-op when already disconnected.
    /// Subscribers stay registered.
    pub async fn disconnect(&self) {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.take() {
            conn.cancel.cancel();
            info!("realtime connection closed");
        }
    }

    pub async fn is_connected(&self) -> bool {
        let slot = self.conn.lock().await;
        slot.as_ref().is_some_and(|c| !c.closed.load(Ordering::SeqCst))
    }

    /// Register a callback for every inbound chat message.
    pub fn subscribe(&self, handler: impl Fn(&ChatMessage) + Send + Sync + 'static) -> Subscription {
        let id = self.listeners.add(Arc::new(handler));
        Subscription { id, listeners: Arc::downgrade(&self.listeners) }
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    /// Join a city-wide room.
    pub async fn join_room(&self, room: &str, user_id: &str) -> Result<(), ApiError> {
        self.send(ClientFrame::JoinRoom { room: room.to_owned(), user_id: user_id.to_owned() }).await
    }

    /// Join a named community room.
    pub async fn join_community_room(&self, room_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.join_room(room_id, user_id).await
    }

    /// Join the one-on-one room shared with `peer_id`.
    pub async fn join_dm_room(&self, user_id: &str, peer_id: &str) -> Result<(), ApiError> {
        self.send(ClientFrame::JoinDmRoom {
            room: dm_room(user_id, peer_id),
            user_id: user_id.to_owned(),
        })
        .await
    }

    /// Send a direct message. Fire-and-forget: no acknowledgment is awaited.
    pub async fn send_message(&self, to: &str, payload: OutboundMessage) -> Result<(), ApiError> {
        self.send(ClientFrame::DmMessage { to: to.to_owned(), payload }).await
    }

    /// Send to a community or city room. Fire-and-forget.
    pub async fn send_message_to_room(
        &self,
        room: &str,
        payload: OutboundMessage,
    ) -> Result<(), ApiError> {
        self.send(ClientFrame::RoomMessage { room: room.to_owned(), payload }).await
    }

    /// Queue a frame, connecting lazily first if needed.
    async fn send(&self, frame: ClientFrame) -> Result<(), ApiError> {
        let out_tx = {
            let mut slot = self.conn.lock().await;
            self.ensure_connected(&mut slot).await?;
            match slot.as_ref() {
                Some(conn) => conn.out_tx.clone(),
                None => return Err(ApiError::Network("realtime connection unavailable".to_owned())),
            }
        };
        out_tx
            .send(frame)
            .await
            .map_err(|_| ApiError::Network("realtime connection closed".to_owned()))
    }

    async fn ensure_connected(&self, slot: &mut Option<Conn>) -> Result<(), ApiError> {
        if let Some(conn) = slot.take() {
            if !conn.closed.load(Ordering::SeqCst) {
                *slot = Some(conn);
                return Ok(());
            }
            // The previous connection died underneath us; replace it.
            conn.cancel.cancel();
        }

        let (stream, _) = tokio_tungstenite::connect_async(&self.ws_url)
            .await
            .map_err(|e| ApiError::Network(format!("realtime connect failed: {e}")))?;
        let (write, read) = stream.split();

        let (out_tx, out_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_writer(write, out_rx, cancel.clone()));
        tokio::spawn(run_reader(read, Arc::clone(&self.listeners), cancel.clone(), Arc::clone(&closed)));

        *slot = Some(Conn { out_tx, cancel, closed });
        info!(url = %self.ws_url, "realtime connection established");
        Ok(())
    }
}

/// The single transport-level reader: forwards every inbound `message` event
/// to the registry.
async fn run_reader(
    mut read: SplitStream<WsStream>,
    listeners: Arc<Listeners>,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerFrame>(&text) {
                            Ok(ServerFrame::Message(wire)) => {
                                listeners.dispatch(&wire.into_message());
                            }
                            Err(e) => debug!("ignoring unrecognized frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Binary, ping, pong.
                    Some(Err(e)) => {
                        debug!("realtime read error: {e}");
                        break;
                    }
                }
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
    // Stop the writer for this connection too.
    cancel.cancel();
}

/// Serializes queued frames onto the socket in FIFO order.
async fn run_writer(
    mut write: SplitSink<WsStream, Message>,
    mut out_rx: mpsc::Receiver<ClientFrame>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = out_rx.recv() => {
                let frame = match frame {
                    Some(f) => f,
                    None => break,
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("dropping unserializable frame: {e}");
                        continue;
                    }
                };
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }
    let _ = write.close().await;
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
