//! # Transport Layer
//!
//! Handlers never see sockets. A response goes back through the
//! [`Transport`] the request arrived on, whichever kind it is.
//!
//! ## Components
//! - **TCP**: owned write half of an accepted stream
//! - **UDP**: shared socket plus the sender's address
//! - **Memory**: channel-backed transport for tests and embedding
//!
//! ## Peer identity
//! Peer keys carry the transport scheme (`tcp://1.2.3.4:5000`,
//! `udp://1.2.3.4:5000`), so a handshake on one transport does not
//! authenticate the same address on the other.

pub mod memory;
pub mod tcp;
pub mod udp;

use std::net::SocketAddr;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;

pub use memory::MemoryTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// Outbound side of a connection or datagram peer.
pub trait Transport: Send + Sync {
    /// Stable identity of the remote peer.
    fn peer_key(&self) -> &str;

    /// Deliver one encoded response.
    fn send(&self, bytes: Bytes) -> BoxFuture<'_, Result<()>>;
}

pub fn tcp_peer_key(addr: SocketAddr) -> String {
    format!("tcp://{addr}")
}

pub fn udp_peer_key(addr: SocketAddr) -> String {
    format!("udp://{addr}")
}

/// True for peers whose responses travel in a single datagram.
pub fn is_datagram_peer(peer_key: &str) -> bool {
    peer_key.starts_with("udp://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_keys_differ_per_transport() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(tcp_peer_key(addr), "tcp://127.0.0.1:5000");
        assert_eq!(udp_peer_key(addr), "udp://127.0.0.1:5000");
        assert!(is_datagram_peer(&udp_peer_key(addr)));
        assert!(!is_datagram_peer(&tcp_peer_key(addr)));
    }
}
