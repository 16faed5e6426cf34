use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use parley_core::ids::ClientId;

use crate::broadcast::Broadcaster;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(90);

/// One live connection as the registry sees it: an outbound queue plus
/// liveness state. The socket itself stays with the tasks in
/// `handle_ws_connection`; only that connection's writer task drains the
/// queue, so writes to a single socket never interleave.
pub struct Client {
    pub id: ClientId,
    tx: mpsc::Sender<String>,
    connected: AtomicBool,
    last_pong: AtomicU64,
}

impl Client {
    fn new(id: ClientId, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            tx,
            connected: AtomicBool::new(true),
            last_pong: AtomicU64::new(now_secs()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    pub fn is_alive(&self) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < CLIENT_TIMEOUT.as_secs()
    }

    /// Queue a payload for this connection's writer task. Does not block;
    /// the error distinguishes a full queue from a gone writer.
    pub(crate) fn try_send(
        &self,
        payload: String,
    ) -> Result<(), mpsc::error::TrySendError<String>> {
        self.tx.try_send(payload)
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Membership tracking for live connections. Mutation and snapshotting go
/// through the sharded map; no lock is ever held across a socket write.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue,
        }
    }

    /// Add a connection. Returns its id and the receive side of its
    /// outbound queue, which the connection's writer task drains. The
    /// connection is a broadcast target from this point on.
    pub fn register(&self) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let client = Arc::new(Client::new(id.clone(), tx));
        self.clients.insert(id.clone(), client);
        (id, rx)
    }

    /// Remove a connection. A no-op if it is already gone, so the
    /// disconnect path and the failed-send path can both call it.
    pub fn unregister(&self, id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(id) {
            client.mark_disconnected();
        }
    }

    /// Point-in-time copy of the active set, safe to iterate while
    /// membership keeps changing. A handle removed before this call is
    /// never included; a concurrent registration may or may not be — it
    /// catches the next broadcast either way.
    pub fn snapshot(&self) -> Vec<Arc<Client>> {
        self.clients
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn get(&self, id: &ClientId) -> Option<Arc<Client>> {
        self.clients.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove clients that haven't answered a ping within the timeout.
    pub fn cleanup_dead_clients(&self) -> usize {
        let dead: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| !entry.value().is_alive())
            .map(|entry| entry.key().clone())
            .collect();

        let removed = dead.len();
        for id in dead {
            self.unregister(&id);
            tracing::info!(client_id = %id, "Cleaned up dead client");
        }
        removed
    }
}

/// Drive one connection from registration to close: split the socket,
/// run the writer (queue drain + heartbeat) and the reader (frame ingest)
/// until either ends, then unregister.
pub async fn handle_ws_connection(
    socket: WebSocket,
    client_id: ClientId,
    mut rx: mpsc::Receiver<String>,
    registry: Arc<ClientRegistry>,
    broadcaster: Arc<Broadcaster>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: forward queued payloads to the socket + periodic ping
    let writer_cid = client_id.clone();
    let writer_registry = Arc::clone(&registry);
    let writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        ping_interval.tick().await; // consume first immediate tick

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(text) => {
                            if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(client_id = %writer_cid, "Sent ping");
                }
            }
        }

        if let Some(client) = writer_registry.get(&writer_cid) {
            client.mark_disconnected();
        }
    });

    // Reader task: decode each inbound frame and fan it out. A malformed
    // frame is fatal to this connection only.
    let reader_cid = client_id.clone();
    let reader_registry = Arc::clone(&registry);
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Text(text) => {
                    if let Err(e) = broadcaster.ingest(text.as_str()) {
                        tracing::warn!(
                            client_id = %reader_cid,
                            error = %e,
                            "Malformed frame, closing connection"
                        );
                        break;
                    }
                }
                WsMessage::Pong(_) => {
                    if let Some(client) = reader_registry.get(&reader_cid) {
                        client.record_pong();
                    }
                }
                WsMessage::Close(_) => break,
                WsMessage::Ping(_) => {} // axum answers pings automatically
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    registry.unregister(&client_id);
    tracing::info!(client_id = %client_id, "Client disconnected");
}

/// Start a background task that periodically sweeps out dead clients.
pub fn start_cleanup_task(
    registry: Arc<ClientRegistry>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = registry.cleanup_dead_clients();
            if removed > 0 {
                tracing::info!(removed = removed, "Dead client cleanup");
            }
        }
    })
}
