use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::net::UdpSocket;

use super::{udp_peer_key, Transport};
use crate::error::{ProtocolError, Result};

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Reply path to one datagram sender over the shared server socket.
pub struct UdpTransport {
    peer_key: String,
    socket: Arc<UdpSocket>,
    addr: SocketAddr,
    max_datagram: usize,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, addr: SocketAddr) -> Self {
        Self {
            peer_key: udp_peer_key(addr),
            socket,
            addr,
            max_datagram: MAX_DATAGRAM_SIZE,
        }
    }

    pub fn with_max_datagram(mut self, max_datagram: usize) -> Self {
        self.max_datagram = max_datagram;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for UdpTransport {
    fn peer_key(&self) -> &str {
        &self.peer_key
    }

    fn send(&self, bytes: Bytes) -> BoxFuture<'_, Result<()>> {
        async move {
            if bytes.len() > self.max_datagram {
                return Err(ProtocolError::TransportError(format!(
                    "response of {} bytes exceeds datagram limit {}",
                    bytes.len(),
                    self.max_datagram
                )));
            }
            let sent = self.socket.send_to(&bytes, self.addr).await?;
            if sent != bytes.len() {
                return Err(ProtocolError::TransportError(format!(
                    "short datagram write: {sent} of {} bytes",
                    bytes.len()
                )));
            }
            Ok(())
        }
        .boxed()
    }
}
