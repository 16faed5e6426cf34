use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use parley_core::ChatMessage;

use crate::client::ClientRegistry;

/// Fans one serialized payload out to every registered connection.
///
/// Delivery is per-connection best effort: a dead connection is dropped
/// from the registry, a slow one loses this payload, and neither outcome
/// touches delivery to the rest or reaches the caller.
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    /// Decode one inbound frame, normalize it, and fan it out. A decode
    /// error is returned so the connection driver can close that
    /// connection; delivery failures are absorbed here.
    pub fn ingest(&self, raw: &str) -> Result<(), serde_json::Error> {
        let message = ChatMessage::from_frame(raw)?;
        self.broadcast(&message.to_payload());
        Ok(())
    }

    /// Deliver `payload` to every connection in the current registry
    /// snapshot, the sender included. Enqueueing happens outside any
    /// registry lock; the per-connection writer task does the socket
    /// write, so a slow peer never stalls the others.
    pub fn broadcast(&self, payload: &str) {
        for client in self.registry.snapshot() {
            if !client.is_connected() {
                self.registry.unregister(&client.id);
                continue;
            }
            match client.try_send(payload.to_string()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    // Backpressure: drop this payload for this connection
                    // only; the connection stays registered.
                    tracing::warn!(
                        client_id = %client.id,
                        payload_len = payload.len(),
                        "Send queue full, dropping payload"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(client_id = %client.id, "Send failed, unregistering");
                    self.registry.unregister(&client.id);
                }
            }
        }
    }
}
