use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::{ProtocolError, Result};

/// Channel-backed transport: every send lands on the paired receiver.
pub struct MemoryTransport {
    peer_key: String,
    outbox: mpsc::UnboundedSender<Bytes>,
}

impl MemoryTransport {
    pub fn new(peer_key: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (outbox, inbox) = mpsc::unbounded_channel();
        (
            Self {
                peer_key: peer_key.into(),
                outbox,
            },
            inbox,
        )
    }
}

impl Transport for MemoryTransport {
    fn peer_key(&self) -> &str {
        &self.peer_key
    }

    fn send(&self, bytes: Bytes) -> BoxFuture<'_, Result<()>> {
        let result = self
            .outbox
            .send(bytes)
            .map_err(|_| ProtocolError::ConnectionClosed);
        futures::future::ready(result).boxed()
    }
}
