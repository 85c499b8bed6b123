use std::net::SocketAddr;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use super::{tcp_peer_key, Transport};
use crate::error::Result;

/// Write side of an accepted (or connected) TCP stream.
///
/// The read half stays with the connection loop; concurrent senders are
/// serialized by the mutex so responses never interleave.
pub struct TcpTransport {
    peer_key: String,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            peer_key: tcp_peer_key(addr),
            writer: Mutex::new(writer),
        }
    }

    /// Close the write direction.
    pub async fn shutdown(&self) -> Result<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

impl Transport for TcpTransport {
    fn peer_key(&self) -> &str {
        &self.peer_key
    }

    fn send(&self, bytes: Bytes) -> BoxFuture<'_, Result<()>> {
        async move {
            let mut writer = self.writer.lock().await;
            writer.write_all(&bytes).await?;
            writer.flush().await?;
            Ok(())
        }
        .boxed()
    }
}
