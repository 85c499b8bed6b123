use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::core::codec::TlvCodec;
use crate::core::tlv;
use crate::error::{ProtocolError, Result};
use crate::protocol::handshake::{redact, HelloRequest};
use crate::protocol::request::{self, ActionReply, Response};
use crate::utils::crypto::MoveCipher;

/// Default time to wait for a response
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Async TCP client for the relay
///
/// Keeps the signature issued by the handshake and seals every later
/// request with it.
pub struct RelayClient {
    framed: Framed<TcpStream, TlvCodec>,
    signature: Option<String>,
    response_timeout: Duration,
}

impl RelayClient {
    #[instrument]
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            framed: Framed::new(stream, TlvCodec),
            signature: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Signature from the last successful handshake
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    fn require_signature(&self) -> Result<&str> {
        self.signature
            .as_deref()
            .ok_or_else(|| ProtocolError::TransportError("handshake not completed".into()))
    }

    /// Write an already encoded message
    pub async fn send_raw(&mut self, wire: Bytes) -> Result<()> {
        for unit in tlv::split(&wire)? {
            self.framed.feed(unit).await?;
        }
        self.framed.flush().await?;
        Ok(())
    }

    /// Wait for the next response unit
    pub async fn receive(&mut self) -> Result<Response> {
        let next = tokio::time::timeout(self.response_timeout, self.framed.next())
            .await
            .map_err(|_| ProtocolError::TransportError("response timed out".into()))?;
        let unit = next.ok_or(ProtocolError::ConnectionClosed)??;
        Response::parse(&unit)
    }

    /// Send a message and wait for its response
    pub async fn request(&mut self, wire: Bytes) -> Result<Response> {
        self.send_raw(wire).await?;
        self.receive().await
    }

    /// Perform the handshake and keep the issued signature
    pub async fn hello(&mut self, hello: &HelloRequest) -> Result<String> {
        match self.request(request::hello(hello)?).await? {
            Response::Signature(signature) => {
                debug!(signature = redact(&signature), "handshake complete");
                self.signature = Some(signature.clone());
                Ok(signature)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Create a game; `Ok(Err(code))` carries a refusal
    pub async fn create_game(&mut self, player: &str) -> Result<std::result::Result<Uuid, String>> {
        let wire = request::create_game(player, self.require_signature()?)?;
        game_id_or_refusal(self.request(wire).await?)
    }

    pub async fn list_lobbies(&mut self) -> Result<Vec<String>> {
        let wire = request::list_lobbies(self.require_signature()?)?;
        match self.request(wire).await? {
            Response::Lobbies(names) => Ok(names),
            other => Err(unexpected(other)),
        }
    }

    /// Join a lobby; `Ok(Err(code))` carries a refusal
    pub async fn join_lobby(
        &mut self,
        lobby: &str,
        player: &str,
    ) -> Result<std::result::Result<Uuid, String>> {
        let wire = request::join_lobby(lobby, player, self.require_signature()?)?;
        game_id_or_refusal(self.request(wire).await?)
    }

    /// Current position; `Ok(Err(code))` carries a refusal
    pub async fn board(&mut self, id: Uuid) -> Result<std::result::Result<String, String>> {
        let wire = request::board(id, self.require_signature()?)?;
        match self.request(wire).await? {
            Response::Board(position) => Ok(Ok(position)),
            Response::Refused(code) => Ok(Err(code)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn make_move(&mut self, id: Uuid, notation: &str) -> Result<ActionReply> {
        let wire = request::make_move(id, notation, self.require_signature()?)?;
        action_reply(self.request(wire).await?)
    }

    pub async fn make_encrypted_move(
        &mut self,
        id: Uuid,
        notation: &str,
        cipher: &MoveCipher,
    ) -> Result<ActionReply> {
        let wire = request::make_encrypted_move(id, notation, cipher, self.require_signature()?)?;
        action_reply(self.request(wire).await?)
    }
}

fn unexpected(response: Response) -> ProtocolError {
    ProtocolError::FormatError(format!("unexpected response: {response:?}"))
}

fn game_id_or_refusal(response: Response) -> Result<std::result::Result<Uuid, String>> {
    match response {
        Response::GameId(id) => Ok(Ok(id)),
        Response::Refused(code) => Ok(Err(code)),
        other => Err(unexpected(other)),
    }
}

fn action_reply(response: Response) -> Result<ActionReply> {
    match response {
        Response::Action(reply) => Ok(reply),
        Response::Refused(code) => Err(ProtocolError::FormatError(format!("move refused: {code}"))),
        other => Err(unexpected(other)),
    }
}
