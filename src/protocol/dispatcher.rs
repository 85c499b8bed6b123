//! Request routing.
//!
//! A fixed table maps each leading tag to its handler. Every handler reads
//! its positional payload, checks the integrity envelope, runs one registry
//! operation and produces exactly one response unit.
//!
//! Domain errors are answered. Integrity, schema and framing errors are
//! returned to the caller, which logs them and keeps the connection open.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::LobbyConfig;
use crate::core::tlv::{self, Tag, Tlv, HEADER_LEN, MAX_VALUE_LEN};
use crate::engine::RuleEngine;
use crate::error::{constants, DomainError, ProtocolError, Result};
use crate::protocol::envelope;
use crate::protocol::handshake::{mint_signature, redact, HelloRequest};
use crate::protocol::message::{Assembled, Message, MessageAssembler};
use crate::registry::{ClientRecord, GameRegistry, SessionRegistry};
use crate::transport::udp::MAX_DATAGRAM_SIZE;
use crate::transport::{is_datagram_peer, Transport};
use crate::utils::crypto::MoveCipher;
use crate::utils::metrics::Metrics;

/// Status sent in an `ActionResponse` for an accepted move.
pub const STATUS_OK: &str = "ok";

type Handler<E> = fn(&Dispatcher<E>, &str, &Message) -> Result<Tlv>;

/// Routes assembled messages to handlers over injected registries.
pub struct Dispatcher<E: RuleEngine> {
    sessions: Arc<SessionRegistry>,
    games: Arc<GameRegistry<E>>,
    lobby: LobbyConfig,
    cipher: Option<MoveCipher>,
    max_datagram_size: usize,
    metrics: Arc<Metrics>,
    handlers: HashMap<u8, Handler<E>>,
}

impl<E: RuleEngine> Dispatcher<E> {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        games: Arc<GameRegistry<E>>,
        lobby: LobbyConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut handlers: HashMap<u8, Handler<E>> = HashMap::new();
        handlers.insert(Tag::HelloRequest.as_byte(), Self::on_hello);
        handlers.insert(Tag::GameRequest.as_byte(), Self::on_create_game);
        handlers.insert(Tag::LobbyRequest.as_byte(), Self::on_list_lobbies);
        handlers.insert(Tag::JoinLobbyRequest.as_byte(), Self::on_join_lobby);
        handlers.insert(Tag::BoardRequest.as_byte(), Self::on_board);
        handlers.insert(Tag::ActionRequest.as_byte(), Self::on_move);

        Self {
            sessions,
            games,
            lobby,
            cipher: None,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            metrics,
            handlers,
        }
    }

    /// Accept encrypted move fields sealed with `cipher`.
    pub fn with_move_cipher(mut self, cipher: MoveCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Largest datagram a UDP response may fill.
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn games(&self) -> &Arc<GameRegistry<E>> {
        &self.games
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Produce the response for one message from `peer_key`.
    #[instrument(level = "debug", skip(self, message), fields(kind = ?message.kind()))]
    pub fn handle(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        self.metrics.request();
        let tag = message.kind().tag().as_byte();
        let handler = self.handlers.get(&tag).ok_or(ProtocolError::UnexpectedTag {
            position: 0,
            expected: tag,
            found: tag,
        })?;

        match handler(self, peer_key, message) {
            Err(ProtocolError::Domain(e)) => {
                debug!(peer = peer_key, code = e.code(), "request refused");
                self.metrics.domain_error();
                Tlv::text(Tag::GameResponse, e.code())
            }
            Err(e) => {
                match e {
                    ProtocolError::IntegrityError(_) => self.metrics.integrity_failure(),
                    _ => self.metrics.protocol_error(),
                }
                Err(e)
            }
            ok => ok,
        }
    }

    /// Feed decoded units through `assembler`, answering each complete message
    /// on `transport`. Errors are logged per message; only a failed send is
    /// returned.
    pub async fn process_units<I>(
        &self,
        assembler: &mut MessageAssembler,
        transport: &dyn Transport,
        units: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = Tlv>,
    {
        for unit in units {
            let message = match assembler.push(unit) {
                Ok(Assembled::Complete(message)) => message,
                Ok(Assembled::Pending) => continue,
                Ok(Assembled::Skipped(unit)) => {
                    warn!(
                        peer = transport.peer_key(),
                        tag = %tlv::tag_name(unit.tag()),
                        "skipping unit that does not start a request"
                    );
                    self.metrics.unit_skipped();
                    continue;
                }
                Ok(Assembled::Abandoned(kind)) => {
                    warn!(
                        peer = transport.peer_key(),
                        ?kind,
                        "dropping incomplete message, next request started early"
                    );
                    self.metrics.protocol_error();
                    continue;
                }
                Err(e) => {
                    warn!(peer = transport.peer_key(), error = %e, "malformed message");
                    self.metrics.protocol_error();
                    continue;
                }
            };

            let response = match self.handle(transport.peer_key(), &message) {
                Ok(response) => response,
                Err(e) => {
                    warn!(peer = transport.peer_key(), kind = ?message.kind(), error = %e, "request dropped");
                    continue;
                }
            };

            let bytes = response.to_bytes();
            let len = bytes.len() as u64;
            transport.send(bytes).await?;
            self.metrics.response_sent(len);
        }
        Ok(())
    }

    fn authenticate(&self, peer_key: &str, message: &Message) -> Result<()> {
        let issued = self.sessions.signature(peer_key)?;
        envelope::verify(message, &issued)
    }

    fn on_hello(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        let hello = HelloRequest::parse(message)?;
        let signature = mint_signature();
        let response = Tlv::text(Tag::HelloResponse, &signature)?;

        let replaced = self
            .sessions
            .insert(ClientRecord::from_hello(peer_key, hello, signature.clone()))?;
        if replaced.is_some() {
            debug!(peer = peer_key, "repeated hello replaced client record");
        }
        self.metrics.handshake();
        debug!(peer = peer_key, signature = redact(&signature), "handshake complete");
        Ok(response)
    }

    fn on_create_game(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        let player = message.expect(1, Tag::ByteData)?.as_str()?.to_owned();
        self.authenticate(peer_key, message)?;

        let lobby = self.lobby.lobby_name(&player);
        let id = self.games.create_game(&player, &lobby)?;
        self.sessions.set_game_id(peer_key, id)?;
        game_id_response(id)
    }

    fn on_list_lobbies(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        self.authenticate(peer_key, message)?;

        let lobbies = self.games.list_lobbies()?;
        let budget = self.response_budget(peer_key);
        let mut names = Vec::with_capacity(lobbies.len());
        let mut used = 0;
        for name in &lobbies {
            let len = HEADER_LEN + name.len();
            if used + len > budget {
                warn!(
                    peer = peer_key,
                    listed = names.len(),
                    total = lobbies.len(),
                    "lobby list truncated to fit one response"
                );
                break;
            }
            names.push(Tlv::text(Tag::String, name)?);
            used += len;
        }
        Tlv::new(Tag::LobbyResponse, tlv::concat(&names))
    }

    /// Room for the value of one response unit sent to `peer_key`.
    fn response_budget(&self, peer_key: &str) -> usize {
        if is_datagram_peer(peer_key) {
            self.max_datagram_size.saturating_sub(HEADER_LEN).min(MAX_VALUE_LEN)
        } else {
            MAX_VALUE_LEN
        }
    }

    fn on_join_lobby(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        let lobby = message.expect(1, Tag::String)?.as_str()?.to_owned();
        let player = message.expect(2, Tag::String)?.as_str()?.to_owned();
        self.authenticate(peer_key, message)?;

        let id = self.games.join_game(&lobby, &player)?;
        self.sessions.set_game_id(peer_key, id)?;
        game_id_response(id)
    }

    fn on_board(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        let id = parse_game_id(message.expect(1, Tag::UuidPartie)?.value())?;
        self.authenticate(peer_key, message)?;

        let position = self.games.board_state(id)?;
        Tlv::text(Tag::BoardResponse, &position)
    }

    fn on_move(&self, peer_key: &str, message: &Message) -> Result<Tlv> {
        let id = parse_game_id(message.expect(1, Tag::UuidPartie)?.value())?;
        self.authenticate(peer_key, message)?;

        let move_unit = &message.units()[2];
        let notation = match move_unit.known_tag() {
            Some(Tag::String) => move_unit.as_str()?.to_owned(),
            Some(Tag::ByteData) => self.decrypt_move(move_unit.value())?,
            _ => {
                return Err(ProtocolError::UnexpectedTag {
                    position: 2,
                    expected: Tag::String.as_byte(),
                    found: move_unit.tag(),
                })
            }
        };

        match self.games.move_in_lobby(id, &notation) {
            Ok(result) => action_response(STATUS_OK, &result.position, &result.outcome.to_string()),
            Err(ProtocolError::Domain(e @ DomainError::IllegalMove(_))) => {
                self.metrics.domain_error();
                let position = self.games.board_state(id)?;
                let outcome = self.games.outcome(id)?;
                action_response(e.code(), &position, &outcome.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn decrypt_move(&self, sealed: &Bytes) -> Result<String> {
        let cipher = self.cipher.as_ref().ok_or_else(|| {
            ProtocolError::FormatError(constants::ERR_ENCRYPTED_MOVE_WITHOUT_KEY.into())
        })?;
        let plaintext = cipher.open(sealed)?;
        String::from_utf8(plaintext)
            .map_err(|_| ProtocolError::FormatError(constants::ERR_INVALID_UTF8.into()))
    }
}

/// Game id carried as 16 raw bytes or as a textual UUID.
pub fn parse_game_id(value: &[u8]) -> Result<Uuid> {
    let invalid = || ProtocolError::FormatError(constants::ERR_INVALID_GAME_ID.into());
    if value.len() == 16 {
        return Uuid::from_slice(value).map_err(|_| invalid());
    }
    let text = std::str::from_utf8(value).map_err(|_| invalid())?;
    Uuid::parse_str(text.trim()).map_err(|_| invalid())
}

fn game_id_response(id: Uuid) -> Result<Tlv> {
    Tlv::new(Tag::UuidPartie, Bytes::copy_from_slice(id.as_bytes()))
}

fn action_response(status: &str, position: &str, outcome: &str) -> Result<Tlv> {
    let nested = [
        Tlv::text(Tag::String, status)?,
        Tlv::text(Tag::String, position)?,
        Tlv::text(Tag::String, outcome)?,
    ];
    Tlv::new(Tag::ActionResponse, tlv::concat(&nested))
}
