//! Client side of the protocol: sealed request builders and response decoding.

use bytes::Bytes;
use uuid::Uuid;

use crate::core::tlv::{self, Tag, Tlv};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{parse_game_id, STATUS_OK};
use crate::protocol::envelope::seal_to_bytes;
use crate::protocol::handshake::HelloRequest;
use crate::utils::crypto::MoveCipher;

/// Hello with a blank signature unit.
pub fn hello(request: &HelloRequest) -> Result<Bytes> {
    seal_to_bytes(&request.to_payload()?, "")
}

pub fn create_game(player: &str, signature: &str) -> Result<Bytes> {
    let payload = [
        Tlv::text(Tag::GameRequest, "")?,
        Tlv::text(Tag::ByteData, player)?,
    ];
    seal_to_bytes(&payload, signature)
}

pub fn list_lobbies(signature: &str) -> Result<Bytes> {
    seal_to_bytes(&[Tlv::text(Tag::LobbyRequest, "")?], signature)
}

pub fn join_lobby(lobby: &str, player: &str, signature: &str) -> Result<Bytes> {
    let payload = [
        Tlv::text(Tag::JoinLobbyRequest, "")?,
        Tlv::text(Tag::String, lobby)?,
        Tlv::text(Tag::String, player)?,
    ];
    seal_to_bytes(&payload, signature)
}

fn game_id_unit(id: Uuid) -> Result<Tlv> {
    Tlv::new(Tag::UuidPartie, Bytes::copy_from_slice(id.as_bytes()))
}

pub fn board(id: Uuid, signature: &str) -> Result<Bytes> {
    let payload = [Tlv::text(Tag::BoardRequest, "")?, game_id_unit(id)?];
    seal_to_bytes(&payload, signature)
}

pub fn make_move(id: Uuid, notation: &str, signature: &str) -> Result<Bytes> {
    let payload = [
        Tlv::text(Tag::ActionRequest, "")?,
        game_id_unit(id)?,
        Tlv::text(Tag::String, notation)?,
    ];
    seal_to_bytes(&payload, signature)
}

/// Move request whose move field is sealed with `cipher`.
pub fn make_encrypted_move(
    id: Uuid,
    notation: &str,
    cipher: &MoveCipher,
    signature: &str,
) -> Result<Bytes> {
    let payload = [
        Tlv::text(Tag::ActionRequest, "")?,
        game_id_unit(id)?,
        Tlv::new(Tag::ByteData, cipher.seal(notation.as_bytes())?)?,
    ];
    seal_to_bytes(&payload, signature)
}

/// Reply to a move request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReply {
    pub status: String,
    pub position: String,
    pub outcome: String,
}

impl ActionReply {
    pub fn accepted(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Signature(String),
    GameId(Uuid),
    Refused(String),
    Lobbies(Vec<String>),
    Board(String),
    Action(ActionReply),
}

impl Response {
    pub fn parse(unit: &Tlv) -> Result<Self> {
        let response = match unit.known_tag() {
            Some(Tag::HelloResponse) => Response::Signature(unit.as_str()?.to_owned()),
            Some(Tag::UuidPartie) => Response::GameId(parse_game_id(unit.value())?),
            Some(Tag::GameResponse) => Response::Refused(unit.as_str()?.to_owned()),
            Some(Tag::BoardResponse) => Response::Board(unit.as_str()?.to_owned()),
            Some(Tag::LobbyResponse) => Response::Lobbies(
                nested_strings(unit.value())?,
            ),
            Some(Tag::ActionResponse) => {
                let mut fields = nested_strings(unit.value())?.into_iter();
                let mut next = || {
                    fields.next().ok_or_else(|| {
                        ProtocolError::FormatError("action response is missing fields".into())
                    })
                };
                Response::Action(ActionReply {
                    status: next()?,
                    position: next()?,
                    outcome: next()?,
                })
            }
            _ => {
                return Err(ProtocolError::FormatError(format!(
                    "unexpected response tag {}",
                    tlv::tag_name(unit.tag())
                )))
            }
        };
        Ok(response)
    }
}

fn nested_strings(value: &[u8]) -> Result<Vec<String>> {
    tlv::split(value)?
        .iter()
        .map(|unit| {
            if unit.tag() != Tag::String.as_byte() {
                return Err(ProtocolError::UnexpectedTag {
                    position: 0,
                    expected: Tag::String.as_byte(),
                    found: unit.tag(),
                });
            }
            unit.as_str().map(str::to_owned)
        })
        .collect()
}
