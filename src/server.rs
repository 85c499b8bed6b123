//! # Relay Server
//!
//! Binds the TCP listener and the UDP socket, feeds decoded units to the
//! dispatcher and writes each response back on the transport it came from.
//!
//! ## Tasks
//! - one accept loop plus one read loop per TCP connection
//! - one receive loop plus one short-lived task per datagram
//!
//! All tasks are spawned on a shared `TaskTracker`. Cancelling the server's
//! token stops the loops; `run` then waits for in-flight handlers up to the
//! configured shutdown timeout.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{RelayConfig, ServerConfig};
use crate::core::codec::{decode_datagram, TlvCodec};
use crate::engine::RuleEngine;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::{Dispatcher, MessageAssembler};
use crate::registry::{GameRegistry, SessionRegistry};
use crate::transport::{TcpTransport, Transport, UdpTransport};
use crate::utils::crypto::MoveCipher;
use crate::utils::metrics::Metrics;

pub struct RelayServer<E: RuleEngine> {
    dispatcher: Arc<Dispatcher<E>>,
    config: ServerConfig,
    tcp: Option<TcpListener>,
    udp: Option<Arc<UdpSocket>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl<E: RuleEngine> RelayServer<E> {
    /// Build the registries and dispatcher from `config` and bind the listeners.
    pub async fn bind(config: &RelayConfig, engine: E) -> Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let games = GameRegistry::with_max_players(engine, config.lobby.max_players);
        let mut dispatcher = Dispatcher::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(games),
            config.lobby.clone(),
            metrics,
        )
        .with_max_datagram_size(config.server.max_datagram_size);
        if let Some(key) = &config.security.move_key {
            dispatcher = dispatcher.with_move_cipher(MoveCipher::from_hex(key)?);
            info!("encrypted move fields enabled");
        }
        Self::bind_with(config.server.clone(), Arc::new(dispatcher)).await
    }

    /// Bind the configured listeners around an existing dispatcher.
    ///
    /// A listener that fails to bind is logged and left out; it is an error
    /// only when nothing could be bound.
    pub async fn bind_with(config: ServerConfig, dispatcher: Arc<Dispatcher<E>>) -> Result<Self> {
        let mut failures = Vec::new();

        let tcp = match &config.tcp_address {
            Some(addr) => match TcpListener::bind(addr).await {
                Ok(listener) => {
                    info!(address = %addr, "TCP listener bound");
                    Some(listener)
                }
                Err(e) => {
                    error!(address = %addr, error = %e, "TCP bind failed");
                    failures.push(format!("tcp {addr}: {e}"));
                    None
                }
            },
            None => None,
        };

        let udp = match &config.udp_address {
            Some(addr) => match UdpSocket::bind(addr).await {
                Ok(socket) => {
                    info!(address = %addr, "UDP socket bound");
                    Some(Arc::new(socket))
                }
                Err(e) => {
                    error!(address = %addr, error = %e, "UDP bind failed");
                    failures.push(format!("udp {addr}: {e}"));
                    None
                }
            },
            None => None,
        };

        if tcp.is_none() && udp.is_none() {
            return Err(ProtocolError::TransportError(if failures.is_empty() {
                "no listener configured".to_string()
            } else {
                format!("no listener could be bound: {}", failures.join(", "))
            }));
        }

        Ok(Self {
            dispatcher,
            config,
            tcp,
            udp,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|l| l.local_addr().ok())
    }

    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<E>> {
        &self.dispatcher
    }

    /// Serve until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        let Self {
            dispatcher,
            config,
            tcp,
            udp,
            shutdown,
            tracker,
        } = self;

        if let Some(listener) = tcp {
            tracker.spawn(accept_loop(
                listener,
                Arc::clone(&dispatcher),
                shutdown.clone(),
                tracker.clone(),
            ));
        }
        if let Some(socket) = udp {
            tracker.spawn(datagram_loop(
                socket,
                Arc::clone(&dispatcher),
                config.clone(),
                shutdown.clone(),
                tracker.clone(),
            ));
        }

        shutdown.cancelled().await;
        info!("Shutting down server. Waiting for in-flight requests...");
        tracker.close();

        if tokio::time::timeout(config.shutdown_timeout, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                timeout_ms = config.shutdown_timeout.as_millis() as u64,
                "Shutdown timeout reached, abandoning remaining tasks"
            );
        } else {
            info!("All tasks finished");
        }

        dispatcher.metrics().log_metrics();
        Ok(())
    }
}

async fn accept_loop<E: RuleEngine>(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<E>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("accept loop stopped");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        tracker.spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&dispatcher),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => error!(error = %e, "Error accepting connection"),
                }
            }
        }
    }
}

#[instrument(skip(stream, dispatcher, shutdown), fields(peer = %addr))]
async fn handle_connection<E: RuleEngine>(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher<E>>,
    shutdown: CancellationToken,
) {
    let metrics = Arc::clone(dispatcher.metrics());
    metrics.connection_established();
    info!("client connected");

    let (reader, writer) = stream.into_split();
    let transport = TcpTransport::new(addr, writer);
    let mut frames = FramedRead::new(reader, TlvCodec);
    let mut assembler = MessageAssembler::new();

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = frames.next() => next,
        };

        match next {
            Some(Ok(unit)) => {
                metrics.bytes_in(unit.encoded_len() as u64);
                let sent = dispatcher
                    .process_units(&mut assembler, &transport, std::iter::once(unit))
                    .await;
                if let Err(e) = sent {
                    warn!(error = %e, "failed to send response");
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "read error");
                break;
            }
            None => break,
        }
    }

    if let Some(partial) = assembler.reset() {
        debug!(tag = %partial, "discarding partial message");
    }
    if let Err(e) = transport.shutdown().await {
        debug!(error = %e, "write half already closed");
    }
    if let Err(e) = dispatcher.sessions().remove(transport.peer_key()) {
        warn!(error = %e, "failed to drop client record");
    }
    metrics.connection_closed();
    info!("client disconnected");
}

async fn datagram_loop<E: RuleEngine>(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher<E>>,
    config: ServerConfig,
    shutdown: CancellationToken,
    tracker: TaskTracker,
) {
    let mut buf = vec![0u8; config.max_datagram_size];
    let idle: Duration = config.udp_idle_timeout;

    while !shutdown.is_cancelled() {
        let received = match tokio::time::timeout(idle, socket.recv_from(&mut buf)).await {
            Ok(received) => received,
            Err(_) => continue,
        };

        match received {
            Ok((len, addr)) => {
                dispatcher.metrics().datagram_received(len as u64);
                let packet = Bytes::copy_from_slice(&buf[..len]);
                tracker.spawn(handle_datagram(
                    packet,
                    UdpTransport::new(Arc::clone(&socket), addr)
                        .with_max_datagram(config.max_datagram_size),
                    Arc::clone(&dispatcher),
                ));
            }
            Err(e) => warn!(error = %e, "UDP receive failed"),
        }
    }
    debug!("datagram loop stopped");
}

#[instrument(skip_all, fields(peer = %transport.addr(), len = packet.len()))]
async fn handle_datagram<E: RuleEngine>(
    packet: Bytes,
    transport: UdpTransport,
    dispatcher: Arc<Dispatcher<E>>,
) {
    let units = match decode_datagram(&packet) {
        Ok(units) => units,
        Err(e) => {
            warn!(error = %e, "dropping datagram");
            dispatcher.metrics().protocol_error();
            return;
        }
    };

    let mut assembler = MessageAssembler::new();
    if let Err(e) = dispatcher
        .process_units(&mut assembler, &transport, units)
        .await
    {
        warn!(error = %e, "failed to send response");
    }
    if !assembler.is_idle() {
        warn!("{}", constants::ERR_TRUNCATED_MESSAGE);
        dispatcher.metrics().protocol_error();
    }
}
